mod ext;
mod macros;

use crate::prelude::*;
use crate::util::DynError;
use axum::http::StatusCode;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing_error::SpanTrace;

pub(crate) use macros::*;

pub(crate) mod prelude {
    pub(crate) use super::ext::{OptionExt as _, ResultExt as _};
    pub(crate) use super::{err, err_ctx, fatal};
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Describes any possible error that may happen in the application lifetime.
#[derive(Clone)]
pub struct Error {
    imp: Arc<ErrorImp>,
}

struct ErrorImp {
    /// Small identifier used for debugging purposes.
    /// It is shown to the user when the error happens, so that we can
    /// lookup the logs by it.
    id: String,
    kind: ErrorKind,

    // Participates only in debug impl
    spantrace: SpanTrace,
}

#[derive(Error, Debug)]
pub(crate) enum ErrorKind {
    #[error(transparent)]
    Tg {
        #[from]
        source: teloxide::RequestError,
    },

    #[error(transparent)]
    Db {
        #[from]
        source: crate::db::DbError,
    },

    #[error(transparent)]
    Auth {
        #[from]
        source: crate::auth::AuthError,
    },

    #[error(transparent)]
    User {
        #[from]
        source: crate::user::UserError,
    },

    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Unrecoverable kind of error, that is not supposed to happen, but when
    /// it happens we can't do anything reasonable about it, so no structural
    /// error handling is possible, this error is just propagated to the top.
    #[error("FATAL: {message}")]
    Fatal {
        message: String,
        source: Option<Box<DynError>>,
    },
}

impl From<sqlx::Error> for ErrorKind {
    fn from(err: sqlx::Error) -> Self {
        Self::Db { source: err.into() }
    }
}

impl Error {
    pub(crate) fn id(&self) -> &str {
        &self.imp.id
    }

    /// Errors caused by interaction with the user.
    /// These are most likely caused by humanz sending wrong input.
    pub(crate) fn is_user_error(&self) -> bool {
        match &self.imp.kind {
            ErrorKind::Auth { .. } | ErrorKind::User { .. } => true,
            ErrorKind::Tg { .. }
            | ErrorKind::Db { .. }
            | ErrorKind::Io { .. }
            | ErrorKind::Json { .. }
            | ErrorKind::Fatal { .. } => false,
        }
    }

    pub(crate) fn http_status(&self) -> StatusCode {
        match &self.imp.kind {
            ErrorKind::Auth { .. } => StatusCode::UNAUTHORIZED,
            ErrorKind::User { source } => source.http_status(),
            ErrorKind::Tg { .. }
            | ErrorKind::Db { .. }
            | ErrorKind::Io { .. }
            | ErrorKind::Json { .. }
            | ErrorKind::Fatal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.imp.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error (id: {}): {}", self.imp.id, self.imp.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.imp.kind.source()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)?;
        fmt::Display::fmt(&self.imp.spantrace, f)
    }
}

impl<T: Into<ErrorKind>> From<T> for Error {
    #[track_caller]
    fn from(kind: T) -> Self {
        let imp = ErrorImp {
            kind: kind.into(),
            id: nanoid::nanoid!(6),
            spantrace: SpanTrace::capture(),
        };

        let err = Self { imp: Arc::new(imp) };

        trace!(err = tracing_err(&err), "Created an error");

        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{UserError, UserId};
    use assert_matches::assert_matches;

    #[test]
    fn user_errors_map_to_client_statuses() {
        let id = UserId::new(7).unwrap();
        let err = Error::from(UserError::NotFound { user_id: id });

        assert!(err.is_user_error());
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(err.id().len(), 6);
        assert_matches!(err.kind(), ErrorKind::User { .. });
    }

    #[test]
    fn fatal_errors_are_internal() {
        let err = fatal!("broken invariant {}", 42);

        assert!(!err.is_user_error());
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().ends_with("FATAL: broken invariant 42"));
    }
}
