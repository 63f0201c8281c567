use super::UserError;
use crate::i18n::Lang;
use crate::prelude::*;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use teloxide::types as tg_api;

/// Identifier of the user in Telegram and in our database.
///
/// Always positive and never exceeds [`i64::MAX`], so it fits into a
/// signed `BIGINT` column without any lossy conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub(crate) struct UserId(u64);

impl UserId {
    pub(crate) const MAX: u64 = i64::MAX as u64;

    pub(crate) fn new(raw: u64) -> Option<Self> {
        (1..=Self::MAX).contains(&raw).then_some(Self(raw))
    }

    pub(crate) fn try_new(raw: u64) -> Result<Self> {
        Self::new(raw).ok_or_else(|| err!(UserError::InvalidId { raw }))
    }

    pub(crate) fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn from_db(raw: i64) -> Result<Self> {
        u64::try_from(raw)
            .ok()
            .and_then(Self::new)
            .fatal_ctx(|| format!("Corrupted user id in the database: {raw}"))
    }

    pub(crate) fn to_db(self) -> i64 {
        // Can't overflow, because the constructor enforces the upper bound
        self.0 as i64
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        s.parse().ok().and_then(Self::new).ok_or(())
    }
}

impl TryFrom<tg_api::UserId> for UserId {
    type Error = crate::Error;

    fn try_from(id: tg_api::UserId) -> Result<Self> {
        Self::try_new(id.0)
    }
}

impl From<UserId> for tg_api::ChatId {
    fn from(id: UserId) -> Self {
        tg_api::ChatId(id.to_db())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct User {
    pub(crate) id: UserId,
    pub(crate) first_name: String,
    pub(crate) last_name: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) bio: Option<String>,

    /// Language explicitly chosen by the user in the bot.
    /// [`None`] means the user didn't pick it yet.
    pub(crate) language_code: Option<String>,
    pub(crate) is_premium: bool,

    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) last_login_at: DateTime<Utc>,

    pub(crate) referred_by: Option<UserId>,
    pub(crate) referral_count: u32,
}

impl User {
    /// Language saved by the user if it's still supported
    pub(crate) fn lang(&self) -> Option<Lang> {
        self.language_code.as_deref().and_then(Lang::from_code)
    }
}

/// Profile data that is refreshed on every interaction of the user with us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpsertUser {
    pub(crate) id: UserId,
    pub(crate) first_name: String,
    pub(crate) last_name: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) bio: Option<String>,
    pub(crate) is_premium: bool,
}

const FIRST_NAME_MAX_LEN: usize = 64;
const LAST_NAME_MAX_LEN: usize = 64;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=32;
const BIO_MAX_LEN: usize = 160;

impl UpsertUser {
    pub(crate) fn from_tg(user: &tg_api::User) -> Result<Self> {
        Ok(Self {
            id: user.id.try_into()?,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            bio: None,
            is_premium: user.is_premium,
        })
    }

    pub(crate) fn validate(&self) -> Result {
        let first_name_len = self.first_name.char_len();
        if first_name_len == 0 || first_name_len > FIRST_NAME_MAX_LEN {
            return Err(invalid_field(
                "first_name",
                format!("must be 1 to {FIRST_NAME_MAX_LEN} characters long"),
            ));
        }

        if let Some(last_name) = &self.last_name {
            if last_name.char_len() > LAST_NAME_MAX_LEN {
                return Err(invalid_field(
                    "last_name",
                    format!("must be at most {LAST_NAME_MAX_LEN} characters long"),
                ));
            }
        }

        if let Some(username) = &self.username {
            if !USERNAME_LEN.contains(&username.char_len()) {
                return Err(invalid_field(
                    "username",
                    format!(
                        "must be {} to {} characters long",
                        USERNAME_LEN.start(),
                        USERNAME_LEN.end()
                    ),
                ));
            }
        }

        if let Some(bio) = &self.bio {
            if bio.char_len() > BIO_MAX_LEN {
                return Err(invalid_field(
                    "bio",
                    format!("must be at most {BIO_MAX_LEN} characters long"),
                ));
            }
        }

        Ok(())
    }
}

fn invalid_field(field: &'static str, reason: String) -> crate::Error {
    err!(UserError::InvalidField { field, reason })
}

#[derive(Debug, Clone)]
pub(crate) struct UpsertedUser {
    pub(crate) user: User,

    /// `true` if the user didn't exist before the upsert.
    pub(crate) is_new: bool,
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    pub(crate) fn user_id(raw: u64) -> UserId {
        UserId::new(raw).unwrap()
    }

    pub(crate) fn user(raw_id: u64) -> User {
        let now = Utc::now();
        User {
            id: user_id(raw_id),
            first_name: format!("User{raw_id}"),
            last_name: None,
            username: None,
            bio: None,
            language_code: None,
            is_premium: false,
            created_at: now,
            updated_at: now,
            last_login_at: now,
            referred_by: None,
            referral_count: 0,
        }
    }

    pub(crate) fn upsert_user(raw_id: u64) -> UpsertUser {
        UpsertUser {
            id: user_id(raw_id),
            first_name: format!("User{raw_id}"),
            last_name: None,
            username: None,
            bio: None,
            is_premium: false,
        }
    }
}
