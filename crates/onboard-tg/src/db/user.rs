//! Relational representation of the users

use crate::prelude::*;
use crate::referral::TopReferrer;
use crate::user::{User, UserId};
use crate::Result;
use chrono::{DateTime, Utc};

#[derive(sea_query::Iden, Clone, Copy)]
pub(super) enum Users {
    Table,
    Id,
    FirstName,
    LastName,
    Username,
    Bio,
    LanguageCode,
    IsPremium,
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
    ReferredBy,
    ReferralCount,
}

pub(super) const USER_COLUMNS: [Users; 12] = [
    Users::Id,
    Users::FirstName,
    Users::LastName,
    Users::Username,
    Users::Bio,
    Users::LanguageCode,
    Users::IsPremium,
    Users::CreatedAt,
    Users::UpdatedAt,
    Users::LastLoginAt,
    Users::ReferredBy,
    Users::ReferralCount,
];

#[derive(sqlx::FromRow)]
pub(super) struct UserRecord {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
    bio: Option<String>,
    language_code: Option<String>,
    is_premium: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: DateTime<Utc>,
    referred_by: Option<i64>,
    referral_count: i32,
}

#[derive(sqlx::FromRow)]
pub(super) struct UpsertedUserRecord {
    #[sqlx(flatten)]
    pub(super) user: UserRecord,
    pub(super) is_new: bool,
}

#[derive(sqlx::FromRow)]
pub(super) struct TopReferrerRecord {
    id: i64,
    username: Option<String>,
    first_name: String,
    referral_count: i32,
}

fn referral_count_from_db(raw: i32) -> Result<u32> {
    u32::try_from(raw).fatal_ctx(|| format!("Negative referral count in the database: {raw}"))
}

impl TryFrom<UserRecord> for User {
    type Error = crate::Error;

    fn try_from(record: UserRecord) -> Result<Self> {
        Ok(Self {
            id: UserId::from_db(record.id)?,
            first_name: record.first_name,
            last_name: record.last_name,
            username: record.username,
            bio: record.bio,
            language_code: record.language_code,
            is_premium: record.is_premium,
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_login_at: record.last_login_at,
            referred_by: record.referred_by.map(UserId::from_db).transpose()?,
            referral_count: referral_count_from_db(record.referral_count)?,
        })
    }
}

impl TryFrom<TopReferrerRecord> for TopReferrer {
    type Error = crate::Error;

    fn try_from(record: TopReferrerRecord) -> Result<Self> {
        Ok(Self {
            user_id: UserId::from_db(record.id)?,
            username: record.username,
            first_name: record.first_name,
            referral_count: referral_count_from_db(record.referral_count)?,
        })
    }
}
