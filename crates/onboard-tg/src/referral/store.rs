use crate::user::{User, UserId};
use crate::Result;
use async_trait::async_trait;

/// User storage operations needed by the referral workflows.
#[async_trait]
pub(crate) trait UserStore: Send {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Unconditionally points `referred` to `referrer`, overwriting any
    /// previous value.
    async fn set_referred_by(&mut self, referred: UserId, referrer: UserId) -> Result;

    /// Must be a single atomic `count = count + 1` on the storage side.
    async fn increment_referral_count(&mut self, referrer: UserId) -> Result;
}

/// Commit boundary of the changes made via the store.
#[async_trait]
pub(crate) trait UnitOfWork: Send {
    async fn commit(&mut self) -> Result;
}
