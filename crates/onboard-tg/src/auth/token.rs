use super::{hmac_sha256, AuthError};
use crate::prelude::*;
use crate::user::UserId;
use crate::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::Mac;
use serde::{Deserialize, Serialize};

/// JOSE header of every token we issue
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT","kid":"main"}"#;

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Issues and validates HS256 JWT access tokens
pub(crate) struct TokenIssuer {
    secret_key: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub(crate) fn new(secret_key: &str, ttl_minutes: u32) -> Self {
        Self {
            secret_key: secret_key.as_bytes().to_vec(),
            ttl: Duration::minutes(ttl_minutes.into()),
        }
    }

    pub(crate) fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: Some(user_id.to_string()),
            exp: Some((now + self.ttl).timestamp()),
            iat: Some(now.timestamp()),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        let header = URL_SAFE_NO_PAD.encode(HEADER);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");

        let signature = hmac_sha256(&self.secret_key, signing_input.as_bytes())?
            .finalize()
            .into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Returns the id of the user the token was issued for
    pub(crate) fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<UserId> {
        let claims = self.verified_claims(token)?;

        if matches!(claims.exp, Some(exp) if exp < now.timestamp()) {
            return Err(err!(AuthError::TokenExpired));
        }

        let sub = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| err!(AuthError::MissingSubject))?;

        sub.parse()
            .map_err(|()| err!(AuthError::InvalidSubject))
    }

    fn verified_claims(&self, token: &str) -> Result<Claims> {
        let invalid = || err!(AuthError::InvalidToken);

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let header: Header = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|header| serde_json::from_slice(&header).ok())
            .ok_or_else(invalid)?;

        if header.alg != "HS256" {
            return Err(invalid());
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        let signing_input = &token[..header_and_payload_len(token)];

        hmac_sha256(&self.secret_key, signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|payload| serde_json::from_slice(&payload).ok())
            .ok_or_else(invalid)
    }
}

/// Length of the `header.payload` prefix of the token
fn header_and_payload_len(token: &str) -> usize {
    token.rfind('.').unwrap_or(token.len())
}
