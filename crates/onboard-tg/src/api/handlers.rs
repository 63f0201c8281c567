use super::middleware::CurrentUser;
use super::ApiState;
use crate::prelude::*;
use crate::referral;
use crate::user::{self, UpsertedUser, UserError, UserId};
use crate::Result;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    success: bool,
    message: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Service is healthy",
    })
}

#[derive(Deserialize)]
pub(crate) struct AuthRequest {
    init_data: String,
}

#[derive(Serialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

/// Exchanges the Mini App init data for an access token
pub(crate) async fn authenticate(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<TokenResponse>> {
    let now = chrono::Utc::now();
    let init_data = state.init_data.validate(&req.init_data, now)?;

    let mut session = state.db.session();
    let UpsertedUser { user, is_new } =
        user::register(&mut *session, init_data.user.to_upsert()?).await?;

    let code = init_data
        .start_param
        .as_deref()
        .and_then(referral::parse_start_payload);

    // Same gate as for the `/start` command in the bot
    if let (true, Some(code)) = (is_new, code) {
        let result = state.referrals.process(&mut *session, user.id, code).await;
        if let Err(err) = result {
            warn!(
                err = tracing_err(&err),
                "Failed to credit the referrer of a new Mini App user"
            );
        }
    }

    Ok(Json(TokenResponse {
        access_token: state.tokens.issue(user.id, now)?,
        token_type: "bearer",
    }))
}

#[derive(Serialize)]
pub(crate) struct ProfileResponse {
    id: UserId,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
    bio: Option<String>,
    language_code: Option<String>,
}

pub(crate) async fn profile(
    State(state): State<Arc<ApiState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>> {
    let user = user::profile(&mut *state.db.session(), user_id).await?;

    Ok(Json(ProfileResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        username: user.username,
        bio: user.bio,
        language_code: user.language_code,
    }))
}

#[derive(Serialize)]
pub(crate) struct ReferralResponse {
    referral_code: String,
    referral_count: u32,
    referral_link: String,
}

pub(crate) async fn referral(
    State(state): State<Arc<ApiState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<ReferralResponse>> {
    let info = state
        .referrals
        .get_info(&mut *state.db.session(), user_id)
        .await?
        .ok_or_else(|| err!(UserError::NotFound { user_id }))?;

    Ok(Json(ReferralResponse {
        referral_link: referral::referral_link(&state.bot_username, &info.referral_code),
        referral_code: info.referral_code.as_str().to_owned(),
        referral_count: info.referral_count,
    }))
}
