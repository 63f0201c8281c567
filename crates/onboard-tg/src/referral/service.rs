use super::{ReferralCode, ReferralCodec, UnitOfWork, UserStore};
use crate::prelude::*;
use crate::user::UserId;
use crate::Result;

pub(crate) const REFERRAL_CREDITS_TOTAL: &str = "referral_credits_total";

/// Deep link payload prefix of the `/start` command that carries a referral code
const START_PAYLOAD_PREFIX: &str = "ref_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReferralInfo {
    pub(crate) referral_code: ReferralCode,
    pub(crate) referral_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
enum CreditOutcome {
    Credited,
    InvalidCode,
    SelfReferral,
    UnknownReferrer,
}

#[derive(Debug)]
pub(crate) struct ReferralService {
    codec: ReferralCodec,
}

impl ReferralService {
    pub(crate) fn new(codec: ReferralCodec) -> Self {
        Self { codec }
    }

    /// Credits the owner of the `code` for inviting `new_user_id`.
    ///
    /// Returns `false` without touching the store if the code is malformed,
    /// points to the new user themselves or to a user that doesn't exist.
    /// Calling this twice for the same new user credits the referrer twice,
    /// so callers must do it only for newly registered users.
    #[instrument(skip(self, session))]
    pub(crate) async fn process<S>(
        &self,
        session: &mut S,
        new_user_id: UserId,
        code: &str,
    ) -> Result<bool>
    where
        S: UserStore + UnitOfWork + ?Sized,
    {
        let outcome = self.credit(session, new_user_id, code).await?;
        let outcome_label: &'static str = outcome.into();

        metrics::increment_counter!(REFERRAL_CREDITS_TOTAL, "outcome" => outcome_label);
        info!(outcome = outcome_label, "Processed referral code");

        Ok(outcome == CreditOutcome::Credited)
    }

    async fn credit<S>(&self, session: &mut S, new_user_id: UserId, code: &str) -> Result<CreditOutcome>
    where
        S: UserStore + UnitOfWork + ?Sized,
    {
        let Some(referrer_id) = self.codec.decode(code) else {
            return Ok(CreditOutcome::InvalidCode);
        };

        if referrer_id == new_user_id.get() {
            return Ok(CreditOutcome::SelfReferral);
        }

        // Out of range values can't belong to any user
        let Some(referrer_id) = UserId::new(referrer_id) else {
            return Ok(CreditOutcome::UnknownReferrer);
        };

        if session.get_user(referrer_id).await?.is_none() {
            return Ok(CreditOutcome::UnknownReferrer);
        }

        session.set_referred_by(new_user_id, referrer_id).await?;
        session.increment_referral_count(referrer_id).await?;
        session.commit().await?;

        Ok(CreditOutcome::Credited)
    }

    /// Returns [`None`] if there is no such user.
    pub(crate) async fn get_info<S>(&self, store: &mut S, user_id: UserId) -> Result<Option<ReferralInfo>>
    where
        S: UserStore + ?Sized,
    {
        let Some(user) = store.get_user(user_id).await? else {
            return Ok(None);
        };

        Ok(Some(ReferralInfo {
            referral_code: self.codec.encode(user_id),
            referral_count: user.referral_count,
        }))
    }
}

pub(crate) fn start_payload(code: &ReferralCode) -> String {
    format!("{START_PAYLOAD_PREFIX}{code}")
}

/// Extracts the referral code from the `/start` deep link payload
pub(crate) fn parse_start_payload(payload: &str) -> Option<&str> {
    payload
        .trim()
        .strip_prefix(START_PAYLOAD_PREFIX)
        .filter(|code| !code.is_empty())
}

pub(crate) fn referral_link(bot_username: &str, code: &ReferralCode) -> String {
    format!("https://t.me/{bot_username}?start={}", start_payload(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::user::test_util::*;
    use crate::user::{register, Database, User};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        GetUser(u64),
        SetReferredBy(u64, u64),
        Increment(u64),
        Commit,
    }

    #[derive(Default)]
    struct RecordingStore {
        users: HashMap<UserId, User>,
        calls: Vec<Call>,
        fail_commit: bool,
    }

    impl RecordingStore {
        fn with_users(ids: &[u64]) -> Self {
            let users = ids.iter().map(|&id| (user_id(id), user(id))).collect();
            Self {
                users,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl UserStore for RecordingStore {
        async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
            self.calls.push(Call::GetUser(id.get()));
            Ok(self.users.get(&id).cloned())
        }

        async fn set_referred_by(&mut self, referred: UserId, referrer: UserId) -> Result {
            self.calls
                .push(Call::SetReferredBy(referred.get(), referrer.get()));
            Ok(())
        }

        async fn increment_referral_count(&mut self, referrer: UserId) -> Result {
            self.calls.push(Call::Increment(referrer.get()));
            Ok(())
        }
    }

    #[async_trait]
    impl UnitOfWork for RecordingStore {
        async fn commit(&mut self) -> Result {
            self.calls.push(Call::Commit);
            if self.fail_commit {
                return Err(fatal!("commit failed"));
            }
            Ok(())
        }
    }

    fn service() -> ReferralService {
        ReferralService::new(ReferralCodec::new(SECRET))
    }

    fn code_of(id: u64) -> String {
        ReferralCodec::new(SECRET).encode_raw(id)
    }

    #[tokio::test]
    async fn credits_existing_referrer() {
        let mut store = RecordingStore::with_users(&[100, 200]);

        let credited = service()
            .process(&mut store, user_id(200), &code_of(100))
            .await
            .unwrap();

        assert!(credited);
        assert_eq!(
            store.calls,
            [
                Call::GetUser(100),
                Call::SetReferredBy(200, 100),
                Call::Increment(100),
                Call::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn rejects_self_referral_without_lookup() {
        let mut store = RecordingStore::with_users(&[42]);

        let credited = service()
            .process(&mut store, user_id(42), &code_of(42))
            .await
            .unwrap();

        assert!(!credited);
        assert!(store.calls.is_empty(), "{:?}", store.calls);
    }

    #[tokio::test]
    async fn rejects_unknown_referrer() {
        let mut store = RecordingStore::with_users(&[200]);

        let credited = service()
            .process(&mut store, user_id(200), &code_of(100))
            .await
            .unwrap();

        assert!(!credited);
        assert_eq!(store.calls, [Call::GetUser(100)]);
    }

    #[tokio::test]
    async fn rejects_malformed_and_out_of_range_codes() {
        let mut store = RecordingStore::with_users(&[200]);

        for code in ["not-valid-base64!!".to_owned(), code_of(0), code_of(u64::MAX)] {
            let credited = service()
                .process(&mut store, user_id(200), &code)
                .await
                .unwrap();
            assert!(!credited, "{code}");
        }

        assert!(store.calls.is_empty(), "{:?}", store.calls);
    }

    #[tokio::test]
    async fn code_from_another_secret_finds_nobody() {
        let mut store = RecordingStore::with_users(&[100, 200]);
        let foreign = ReferralCodec::new("another-secret").encode_raw(100);

        let credited = service()
            .process(&mut store, user_id(200), &foreign)
            .await
            .unwrap();

        assert!(!credited);
        assert!(!store.calls.contains(&Call::Commit));
    }

    #[tokio::test]
    async fn commit_failure_propagates() {
        let mut store = RecordingStore {
            fail_commit: true,
            ..RecordingStore::with_users(&[100, 200])
        };

        service()
            .process(&mut store, user_id(200), &code_of(100))
            .await
            .unwrap_err();
    }

    #[tokio::test]
    async fn repeated_processing_is_not_deduplicated() {
        let db = MemoryDb::default();
        for id in [100, 200] {
            register(&mut *db.session(), upsert_user(id)).await.unwrap();
        }

        let service = service();
        for _ in 0..2 {
            let credited = service
                .process(&mut *db.session(), user_id(200), &code_of(100))
                .await
                .unwrap();
            assert!(credited);
        }

        let referrer = db.session().get_user(user_id(100)).await.unwrap().unwrap();
        let referred = db.session().get_user(user_id(200)).await.unwrap().unwrap();

        assert_eq!(referrer.referral_count, 2);
        assert_eq!(referred.referred_by, Some(user_id(100)));
    }

    #[tokio::test]
    async fn info_of_existing_user() {
        let mut store = RecordingStore::with_users(&[123_456_789]);
        store
            .users
            .get_mut(&user_id(123_456_789))
            .unwrap()
            .referral_count = 3;

        let info = service()
            .get_info(&mut store, user_id(123_456_789))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(info.referral_code.as_str(), "LOrG82Q4CzE");
        assert_eq!(info.referral_count, 3);
    }

    #[tokio::test]
    async fn info_of_unknown_user() {
        let mut store = RecordingStore::default();
        let info = service().get_info(&mut store, user_id(1)).await.unwrap();
        assert_eq!(info, None);
    }

    #[test]
    fn start_payloads() {
        assert_eq!(parse_start_payload("ref_LOrG82Q4CzE"), Some("LOrG82Q4CzE"));
        assert_eq!(parse_start_payload(" ref_abc "), Some("abc"));
        assert_eq!(parse_start_payload("ref_"), None);
        assert_eq!(parse_start_payload("promo_abc"), None);
        assert_eq!(parse_start_payload(""), None);

        let code = ReferralCodec::new(SECRET).encode(user_id(123_456_789));
        assert_eq!(
            referral_link("onboard_bot", &code),
            "https://t.me/onboard_bot?start=ref_LOrG82Q4CzE"
        );
    }
}
