use super::{hmac_sha256, AuthError};
use crate::prelude::*;
use crate::user::{UpsertUser, UserId};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use hmac::Mac;
use itertools::Itertools;
use serde::Deserialize;

/// User object passed by Telegram to the Mini App
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WebAppUser {
    pub(crate) id: u64,
    pub(crate) first_name: String,
    pub(crate) last_name: Option<String>,
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) is_premium: bool,
}

impl WebAppUser {
    pub(crate) fn to_upsert(&self) -> Result<UpsertUser> {
        Ok(UpsertUser {
            id: UserId::try_new(self.id)?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
            bio: None,
            is_premium: self.is_premium,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InitData {
    pub(crate) user: WebAppUser,
    pub(crate) start_param: Option<String>,
}

/// Verifies the signature of the Mini App init data as described in
/// <https://core.telegram.org/bots/webapps#validating-data-received-via-the-mini-app>
pub(crate) struct InitDataValidator {
    bot_token: String,
    max_age: Duration,
}

fn invalid(reason: &'static str) -> crate::Error {
    err!(AuthError::InvalidInitData { reason })
}

impl InitDataValidator {
    pub(crate) fn new(bot_token: String, max_age_secs: u32) -> Self {
        Self {
            bot_token,
            max_age: Duration::seconds(max_age_secs.into()),
        }
    }

    pub(crate) fn validate(&self, raw: &str, now: DateTime<Utc>) -> Result<InitData> {
        let mut hash = None;
        let mut fields = vec![];

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key == "hash" {
                hash = Some(value.into_owned());
            } else {
                fields.push((key.into_owned(), value.into_owned()));
            }
        }

        let hash = hash.ok_or_else(|| invalid("missing hash"))?;
        let hash = hex::decode(hash).map_err(|_| invalid("malformed hash"))?;

        self.signature(&mut fields)?
            .verify_slice(&hash)
            .map_err(|_| invalid("signature mismatch"))?;

        let field = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        let auth_date = field("auth_date")
            .and_then(|secs| secs.parse().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| invalid("missing or malformed auth_date"))?;

        if now - auth_date > self.max_age {
            return Err(invalid("init data is too old"));
        }

        let user = field("user").ok_or_else(|| invalid("missing user"))?;
        let user = serde_json::from_str(user).map_err(|_| invalid("malformed user"))?;

        Ok(InitData {
            user,
            start_param: field("start_param").map(ToOwned::to_owned),
        })
    }

    /// Sorts the fields, because that's what the data-check string requires
    fn signature(&self, fields: &mut [(String, String)]) -> Result<super::HmacSha256> {
        fields.sort();

        let data_check_string = fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .join("\n");

        let secret = hmac_sha256(b"WebAppData", self.bot_token.as_bytes())?
            .finalize()
            .into_bytes();

        hmac_sha256(&secret, data_check_string.as_bytes())
    }

    /// Produces init data signed the same way Telegram does it
    #[cfg(test)]
    pub(crate) fn sign(&self, fields: &[(&str, &str)]) -> String {
        let mut owned: Vec<_> = fields
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();

        let hash = hex::encode(self.signature(&mut owned).unwrap().finalize().into_bytes());

        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .append_pair("hash", &hash)
            .finish()
    }
}
