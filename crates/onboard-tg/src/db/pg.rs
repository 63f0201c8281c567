use super::user::{TopReferrerRecord, UpsertedUserRecord, UserRecord, Users, USER_COLUMNS};
use crate::i18n::Lang;
use crate::prelude::*;
use crate::referral::{ReferralCounts, TopReferrer, UnitOfWork, UserStore};
use crate::user::{Database, Session, UpsertUser, UpsertedUser, User, UserId, UserRepo};
use crate::Result;
use async_trait::async_trait;
use sea_query::{Expr, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

#[derive(Clone)]
pub(crate) struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Database for PgDatabase {
    fn session(&self) -> Box<dyn Session> {
        Box::new(PgSession {
            pool: self.pool.clone(),
            tx: None,
        })
    }
}

/// Lazily begins a transaction on the first query. Dropping the session
/// without a commit rolls the transaction back.
struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    async fn conn(&mut self) -> Result<&mut PgConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(&mut **self.tx.insert(tx))
    }
}

const UPSERT_USER: &str = "
    insert into users as u (id, first_name, last_name, username, bio, is_premium)
    values ($1, $2, $3, $4, $5, $6)
    on conflict (id) do update set
        first_name    = excluded.first_name,
        last_name     = excluded.last_name,
        username      = excluded.username,
        bio           = coalesce(excluded.bio, u.bio),
        is_premium    = excluded.is_premium,
        updated_at    = now(),
        last_login_at = now()
    returning
        id, first_name, last_name, username, bio, language_code, is_premium,
        created_at, updated_at, last_login_at, referred_by, referral_count,
        -- xmax is zero only for the rows that were freshly inserted
        (xmax = 0) as is_new
";

const REFERRAL_COUNTS: &str = "
    select count(*) as total_users, count(referred_by) as referred_users
    from users
";

#[async_trait]
impl UserStore for PgSession {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        let (sql, values) = Query::select()
            .columns(USER_COLUMNS)
            .from(Users::Table)
            .and_where(Expr::col(Users::Id).eq(id.to_db()))
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_as_with::<_, UserRecord, _>(&sql, values)
            .fetch_optional(self.conn().await?)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_referred_by(&mut self, referred: UserId, referrer: UserId) -> Result {
        let (sql, values) = Query::update()
            .table(Users::Table)
            .value(Users::ReferredBy, referrer.to_db())
            .value(Users::UpdatedAt, Expr::cust("now()"))
            .and_where(Expr::col(Users::Id).eq(referred.to_db()))
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_with(&sql, values)
            .execute(self.conn().await?)
            .await?;

        Ok(())
    }

    async fn increment_referral_count(&mut self, referrer: UserId) -> Result {
        let (sql, values) = Query::update()
            .table(Users::Table)
            .value(
                Users::ReferralCount,
                Expr::col(Users::ReferralCount).add(1),
            )
            .value(Users::UpdatedAt, Expr::cust("now()"))
            .and_where(Expr::col(Users::Id).eq(referrer.to_db()))
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_with(&sql, values)
            .execute(self.conn().await?)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserRepo for PgSession {
    async fn upsert_user(&mut self, user: UpsertUser) -> Result<UpsertedUser> {
        let record: UpsertedUserRecord = sqlx::query_as(UPSERT_USER)
            .bind(user.id.to_db())
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.username)
            .bind(user.bio)
            .bind(user.is_premium)
            .fetch_one(self.conn().await?)
            .await?;

        Ok(UpsertedUser {
            user: record.user.try_into()?,
            is_new: record.is_new,
        })
    }

    async fn update_language(&mut self, id: UserId, lang: Lang) -> Result<bool> {
        let code: &'static str = lang.into();

        let (sql, values) = Query::update()
            .table(Users::Table)
            .value(Users::LanguageCode, code)
            .value(Users::UpdatedAt, Expr::cust("now()"))
            .and_where(Expr::col(Users::Id).eq(id.to_db()))
            .build_sqlx(PostgresQueryBuilder);

        let result = sqlx::query_with(&sql, values)
            .execute(self.conn().await?)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn referral_counts(&mut self) -> Result<ReferralCounts> {
        let (total_users, referred_users): (i64, i64) = sqlx::query_as(REFERRAL_COUNTS)
            .fetch_one(self.conn().await?)
            .await?;

        let to_u64 = |count: i64| {
            u64::try_from(count).fatal_ctx(|| format!("Negative users count: {count}"))
        };

        Ok(ReferralCounts {
            total_users: to_u64(total_users)?,
            referred_users: to_u64(referred_users)?,
        })
    }

    async fn top_referrers(&mut self, limit: u32) -> Result<Vec<TopReferrer>> {
        let (sql, values) = Query::select()
            .columns([
                Users::Id,
                Users::Username,
                Users::FirstName,
                Users::ReferralCount,
            ])
            .from(Users::Table)
            .and_where(Expr::col(Users::ReferralCount).gt(0))
            .order_by(Users::ReferralCount, Order::Desc)
            .order_by(Users::Id, Order::Asc)
            .limit(limit.into())
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_as_with::<_, TopReferrerRecord, _>(&sql, values)
            .fetch_all(self.conn().await?)
            .await?
            .into_iter()
            .map(TopReferrer::try_from)
            .collect()
    }
}

#[async_trait]
impl UnitOfWork for PgSession {
    async fn commit(&mut self) -> Result {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}
