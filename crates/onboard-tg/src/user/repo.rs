use super::{UpsertUser, UpsertedUser, UserId};
use crate::i18n::Lang;
use crate::referral::{ReferralCounts, TopReferrer, UnitOfWork, UserStore};
use crate::Result;
use async_trait::async_trait;

/// Full set of storage operations on users. The referral workflows depend
/// only on the narrower [`UserStore`].
#[async_trait]
pub(crate) trait UserRepo: UserStore {
    /// Creates the user or refreshes the profile fields of the existing one.
    /// Referral data and the chosen language are never touched here.
    async fn upsert_user(&mut self, user: UpsertUser) -> Result<UpsertedUser>;

    /// Returns `false` if there is no user with the given id.
    async fn update_language(&mut self, id: UserId, lang: Lang) -> Result<bool>;

    async fn referral_counts(&mut self) -> Result<ReferralCounts>;

    /// Users with at least one referral, the most successful ones first.
    async fn top_referrers(&mut self, limit: u32) -> Result<Vec<TopReferrer>>;
}

/// A single transactional conversation with the storage.
pub(crate) trait Session: UserRepo + UnitOfWork {}

impl<T: UserRepo + UnitOfWork + ?Sized> Session for T {}

/// Storage backend that opens [`Session`]s.
pub(crate) trait Database: Send + Sync + 'static {
    fn session(&self) -> Box<dyn Session>;
}
