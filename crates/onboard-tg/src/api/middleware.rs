use super::{ApiState, HTTP_REQUEST_DURATION_SECONDS};
use crate::auth::AuthError;
use crate::prelude::*;
use crate::user::UserId;
use crate::Result;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;

/// Id of the user that owns the access token of the request
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurrentUser(pub(crate) UserId);

pub(crate) async fn require_user(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| err!(AuthError::MissingToken))?;

    let user_id = state.tokens.validate(token, chrono::Utc::now())?;

    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}

pub(crate) async fn track_duration(req: Request, next: Next) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_default();

    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        start.elapsed(),
        "method" => method,
        "path" => path,
        "status" => response.status().as_u16().to_string()
    );

    response
}
