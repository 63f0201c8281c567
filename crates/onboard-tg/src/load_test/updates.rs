//! Fake updates that look like they came from Telegram

use super::Scenario;
use crate::referral::{self, ReferralCode};
use crate::Result;
use serde_json::{json, Value};
use teloxide::types::Update;

/// Parameters shared by all updates of a single load test run
pub(crate) struct UpdateFactory {
    pub(crate) scenario: Scenario,
    pub(crate) user_pool_size: u64,
    pub(crate) base_user_id: u64,

    /// Code of the base user, required only for [`Scenario::StartReferral`]
    pub(crate) referral_code: Option<ReferralCode>,
}

impl UpdateFactory {
    /// Id of the sender of the `i`-th update
    pub(crate) fn user_id(&self, i: u64) -> u64 {
        let pool = self.user_pool_size.max(1);
        match self.scenario {
            // The base user is the referrer, so they aren't in the pool
            Scenario::StartReferral => self.base_user_id + 1 + i % pool,
            Scenario::Start | Scenario::CallbackLanguage | Scenario::Referral => {
                self.base_user_id + i % pool
            }
        }
    }

    pub(crate) fn update(&self, i: u64) -> Result<Update> {
        let update_id = i + 1;
        let user_id = self.user_id(i);

        let json = match self.scenario {
            Scenario::Start => command_update(update_id, user_id, "/start".to_owned()),
            Scenario::StartReferral => {
                let payload = self
                    .referral_code
                    .as_ref()
                    .map(referral::start_payload)
                    .unwrap_or_default();

                command_update(update_id, user_id, format!("/start {payload}"))
            }
            Scenario::CallbackLanguage => callback_update(update_id, user_id, "onboard:en"),
            Scenario::Referral => command_update(update_id, user_id, "/referral".to_owned()),
        };

        // `Update` only deserializes its kind correctly from a string,
        // `from_value` turns every update into `UpdateKind::Error`
        Ok(serde_json::from_str(&json.to_string())?)
    }
}

fn user(user_id: u64) -> Value {
    json!({
        "id": user_id,
        "is_bot": false,
        "first_name": format!("LoadTestUser_{user_id}"),
        "language_code": "en",
    })
}

fn private_chat(user_id: u64) -> Value {
    json!({
        "id": user_id,
        "type": "private",
        "first_name": format!("LoadTestUser_{user_id}"),
    })
}

fn command_update(update_id: u64, user_id: u64, text: String) -> Value {
    let command_len = text.split_whitespace().next().map_or(0, str::len);

    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": chrono::Utc::now().timestamp(),
            "chat": private_chat(user_id),
            "from": user(user_id),
            "text": text,
            "entities": [{ "type": "bot_command", "offset": 0, "length": command_len }],
        },
    })
}

fn callback_update(update_id: u64, user_id: u64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": update_id.to_string(),
            "from": user(user_id),
            "chat_instance": "load-test",
            "data": data,
            "message": {
                "message_id": update_id,
                "date": chrono::Utc::now().timestamp(),
                "chat": private_chat(user_id),
                "from": super::mock_api::bot_user(),
                "text": "Please choose your language:",
            },
        },
    })
}
