//! Storage that lives only in the process memory. It is used in tests and
//! for load testing of the bot without a database at hand.

use crate::i18n::Lang;
use crate::prelude::*;
use crate::referral::{ReferralCounts, TopReferrer, UnitOfWork, UserStore};
use crate::user::{Database, Session, UpsertUser, UpsertedUser, User, UserId, UserRepo};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

type Users = BTreeMap<UserId, User>;

#[derive(Default)]
struct State {
    users: Users,

    /// Ids of new users that some session has created but not committed yet.
    /// Only the session that claimed the id reports the user as new.
    claimed: BTreeSet<UserId>,
}

#[derive(Default, Clone)]
pub(crate) struct MemoryDb {
    state: Arc<Mutex<State>>,
}

impl Database for MemoryDb {
    fn session(&self) -> Box<dyn Session> {
        Box::new(MemorySession {
            state: self.state.clone(),
            pending: vec![],
            claims: vec![],
        })
    }
}

/// Writes are buffered and applied to the shared state only on commit,
/// all at once under the lock.
struct MemorySession {
    state: Arc<Mutex<State>>,
    pending: Vec<Write>,
    claims: Vec<UserId>,
}

enum Write {
    Upsert {
        user: UpsertUser,
        now: DateTime<Utc>,
    },
    SetReferredBy {
        referred: UserId,
        referrer: UserId,
    },
    IncrementReferralCount {
        referrer: UserId,
    },
    UpdateLanguage {
        id: UserId,
        lang: Lang,
    },
}

impl Write {
    fn target(&self) -> UserId {
        match self {
            Self::Upsert { user, .. } => user.id,
            Self::SetReferredBy { referred, .. } => *referred,
            Self::IncrementReferralCount { referrer } => *referrer,
            Self::UpdateLanguage { id, .. } => *id,
        }
    }

    fn apply(&self, users: &mut Users) {
        match self {
            Self::Upsert { user, now } => {
                let UpsertUser {
                    id,
                    first_name,
                    last_name,
                    username,
                    bio,
                    is_premium,
                } = user.clone();

                match users.get_mut(&id) {
                    Some(existing) => {
                        existing.first_name = first_name;
                        existing.last_name = last_name;
                        existing.username = username;
                        existing.bio = bio.or(existing.bio.take());
                        existing.is_premium = is_premium;
                        existing.updated_at = *now;
                        existing.last_login_at = *now;
                    }
                    None => {
                        users.insert(
                            id,
                            User {
                                id,
                                first_name,
                                last_name,
                                username,
                                bio,
                                language_code: None,
                                is_premium,
                                created_at: *now,
                                updated_at: *now,
                                last_login_at: *now,
                                referred_by: None,
                                referral_count: 0,
                            },
                        );
                    }
                }
            }
            Self::SetReferredBy { referred, referrer } => {
                if let Some(user) = users.get_mut(referred) {
                    user.referred_by = Some(*referrer);
                }
            }
            Self::IncrementReferralCount { referrer } => {
                if let Some(user) = users.get_mut(referrer) {
                    user.referral_count = user.referral_count.saturating_add(1);
                }
            }
            Self::UpdateLanguage { id, lang } => {
                if let Some(user) = users.get_mut(id) {
                    let code: &'static str = (*lang).into();
                    user.language_code = Some(code.to_owned());
                }
            }
        }
    }
}

impl MemorySession {
    /// Reserves the id of a user that doesn't exist yet. Returns `false` if
    /// the user was committed or claimed by another session in the meantime.
    fn claim(&mut self, id: UserId) -> bool {
        let mut state = self.state.lock();
        if state.users.contains_key(&id) || !state.claimed.insert(id) {
            return false;
        }
        self.claims.push(id);
        true
    }

    fn release_claims(&mut self, state: &mut State) {
        for id in self.claims.drain(..) {
            state.claimed.remove(&id);
        }
    }

    /// State of a single user as this session sees it
    fn view_user(&self, id: UserId) -> Option<User> {
        let mut view: Users = self
            .state
            .lock()
            .users
            .get(&id)
            .map(|user| (id, user.clone()))
            .into_iter()
            .collect();

        for write in self.pending.iter().filter(|write| write.target() == id) {
            write.apply(&mut view);
        }

        view.remove(&id)
    }

    fn view_all(&self) -> Users {
        let mut view = self.state.lock().users.clone();
        for write in &self.pending {
            write.apply(&mut view);
        }
        view
    }
}

#[async_trait]
impl UserStore for MemorySession {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.view_user(id))
    }

    async fn set_referred_by(&mut self, referred: UserId, referrer: UserId) -> Result {
        self.pending.push(Write::SetReferredBy { referred, referrer });
        Ok(())
    }

    async fn increment_referral_count(&mut self, referrer: UserId) -> Result {
        self.pending.push(Write::IncrementReferralCount { referrer });
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemorySession {
    async fn upsert_user(&mut self, user: UpsertUser) -> Result<UpsertedUser> {
        let id = user.id;
        let is_new = self.view_user(id).is_none() && self.claim(id);

        self.pending.push(Write::Upsert {
            user,
            now: Utc::now(),
        });

        let user = self
            .view_user(id)
            .ok_or_else(|| fatal!("User {id} disappeared right after the upsert"))?;

        Ok(UpsertedUser { user, is_new })
    }

    async fn update_language(&mut self, id: UserId, lang: Lang) -> Result<bool> {
        if self.view_user(id).is_none() {
            return Ok(false);
        }
        self.pending.push(Write::UpdateLanguage { id, lang });
        Ok(true)
    }

    async fn referral_counts(&mut self) -> Result<ReferralCounts> {
        let users = self.view_all();
        let referred_users = users
            .values()
            .filter(|user| user.referred_by.is_some())
            .count();

        Ok(ReferralCounts {
            total_users: users.len() as u64,
            referred_users: referred_users as u64,
        })
    }

    async fn top_referrers(&mut self, limit: u32) -> Result<Vec<TopReferrer>> {
        let mut referrers: Vec<_> = self
            .view_all()
            .into_values()
            .filter(|user| user.referral_count > 0)
            .collect();

        // Stable sort keeps the id order among equal counts
        referrers.sort_by(|a, b| b.referral_count.cmp(&a.referral_count));

        Ok(referrers
            .into_iter()
            .take(limit as usize)
            .map(|user| TopReferrer {
                user_id: user.id,
                username: user.username,
                first_name: user.first_name,
                referral_count: user.referral_count,
            })
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for MemorySession {
    async fn commit(&mut self) -> Result {
        let state = self.state.clone();
        let mut state = state.lock();
        for write in self.pending.drain(..) {
            write.apply(&mut state.users);
        }
        self.release_claims(&mut state);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.claims.is_empty() {
            return;
        }
        let state = self.state.clone();
        self.release_claims(&mut state.lock());
    }
}
