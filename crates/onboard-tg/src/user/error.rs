use super::UserId;
use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub(crate) enum UserError {
    #[error("User {user_id} not found")]
    NotFound { user_id: UserId },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("User id {raw} is out of the supported range")]
    InvalidId { raw: u64 },
}

impl UserError {
    pub(crate) fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidField { .. } | Self::InvalidId { .. } => StatusCode::BAD_REQUEST,
        }
    }
}
