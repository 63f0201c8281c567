//! Authentication of the HTTP API users via Telegram Mini App init data
//! and the access tokens we issue in exchange for it.

mod init_data;
mod token;

pub(crate) use init_data::*;
pub(crate) use token::*;

use crate::prelude::*;
use crate::Result;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Deserialize)]
pub(crate) struct Config {
    pub(crate) secret_key: String,

    #[serde(default = "default_access_token_expire_minutes")]
    pub(crate) access_token_expire_minutes: u32,

    #[serde(default = "default_init_data_max_age_secs")]
    pub(crate) init_data_max_age_secs: u32,
}

fn default_access_token_expire_minutes() -> u32 {
    24 * 60
}

fn default_init_data_max_age_secs() -> u32 {
    24 * 60 * 60
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Not authenticated")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token missing subject")]
    MissingSubject,

    #[error("Invalid user ID in token")]
    InvalidSubject,

    #[error("Invalid init data: {reason}")]
    InvalidInitData { reason: &'static str },
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| fatal!("HMAC-SHA256 rejected a key of {} bytes", key.len()))?;
    mac.update(data);
    Ok(mac)
}
