use crate::user::{Session, UserId};
use crate::Result;

pub(crate) const DEFAULT_TOP_REFERRERS_LIMIT: u32 = 10;

/// Raw counters as they are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReferralCounts {
    pub(crate) total_users: u64,
    pub(crate) referred_users: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReferralStats {
    pub(crate) total_users: u64,
    pub(crate) referred_users: u64,
    pub(crate) organic_users: u64,
    pub(crate) referred_percentage: f64,
    pub(crate) organic_percentage: f64,
}

impl From<ReferralCounts> for ReferralStats {
    fn from(counts: ReferralCounts) -> Self {
        let ReferralCounts {
            total_users,
            referred_users,
        } = counts;

        let organic_users = total_users.saturating_sub(referred_users);

        Self {
            total_users,
            referred_users,
            organic_users,
            referred_percentage: percentage(referred_users, total_users),
            organic_percentage: percentage(organic_users, total_users),
        }
    }
}

/// Rounded to one decimal place
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let value = part as f64 / total as f64 * 100.0;
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TopReferrer {
    pub(crate) user_id: UserId,
    pub(crate) username: Option<String>,
    pub(crate) first_name: String,
    pub(crate) referral_count: u32,
}

pub(crate) async fn referral_stats<S: Session + ?Sized>(session: &mut S) -> Result<ReferralStats> {
    Ok(session.referral_counts().await?.into())
}

pub(crate) async fn top_referrers<S: Session + ?Sized>(
    session: &mut S,
    limit: u32,
) -> Result<Vec<TopReferrer>> {
    session.top_referrers(limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::referral::{ReferralCodec, ReferralService};
    use crate::user::test_util::*;
    use crate::user::{register, Database};

    #[test]
    fn percentages() {
        let stats = ReferralStats::from(ReferralCounts {
            total_users: 3,
            referred_users: 1,
        });

        assert_eq!(stats.organic_users, 2);
        assert_eq!(stats.referred_percentage, 33.3);
        assert_eq!(stats.organic_percentage, 66.7);
    }

    #[test]
    fn percentages_without_users() {
        let stats = ReferralStats::from(ReferralCounts::default());
        assert_eq!(stats.referred_percentage, 0.0);
        assert_eq!(stats.organic_percentage, 0.0);
    }

    #[tokio::test]
    async fn stats_over_the_store() {
        let db = MemoryDb::default();
        for id in 1..=5 {
            register(&mut *db.session(), upsert_user(id)).await.unwrap();
        }

        let codec = ReferralCodec::new("secret");
        let service = ReferralService::new(codec.clone());

        // User 1 invites 2 and 3, user 4 invites 5
        for (new_user, referrer) in [(2, 1), (3, 1), (5, 4)] {
            let code = codec.encode_raw(referrer);
            let credited = service
                .process(&mut *db.session(), user_id(new_user), &code)
                .await
                .unwrap();
            assert!(credited);
        }

        let stats = referral_stats(&mut *db.session()).await.unwrap();
        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.referred_users, 3);
        assert_eq!(stats.referred_percentage, 60.0);

        let top = top_referrers(&mut *db.session(), DEFAULT_TOP_REFERRERS_LIMIT)
            .await
            .unwrap();
        let top: Vec<_> = top
            .iter()
            .map(|referrer| (referrer.user_id.get(), referrer.referral_count))
            .collect();
        assert_eq!(top, [(1, 2), (4, 1)]);

        let top = top_referrers(&mut *db.session(), 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }
}
