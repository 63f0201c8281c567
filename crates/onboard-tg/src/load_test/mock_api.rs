//! Local stand-in for the Telegram Bot API, so the load test measures
//! only our own code

use crate::prelude::*;
use crate::Result;
use axum::body::Bytes;
use axum::http::Uri;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

pub(crate) const BOT_TOKEN: &str = "123456789:load-test-token";

const BOT_ID: u64 = 123_456_789;

pub(crate) struct MockBotApi {
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl MockBotApi {
    pub(crate) async fn start() -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let app = Router::new().fallback(respond);

        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!(err = tracing_err(&err), "Mock Bot API server failed");
            }
        });

        debug!(%addr, "Started mock Bot API");

        Ok(Self { addr, server })
    }

    pub(crate) fn url(&self) -> Result<url::Url> {
        format!("http://{}", self.addr)
            .parse()
            .fatal_ctx(|| "Invalid mock Bot API URL")
    }
}

impl Drop for MockBotApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub(crate) fn bot_user() -> Value {
    json!({
        "id": BOT_ID,
        "is_bot": true,
        "first_name": "Load Test Bot",
        "username": "load_test_bot",
    })
}

/// Requests look like `POST /bot{token}/{method}` with a JSON body
async fn respond(uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default();
    let params: Value = serde_json::from_slice(&body).unwrap_or_default();

    Json(json!({ "ok": true, "result": result(method, &params) }))
}

/// Method names are case-insensitive in the Bot API, and teloxide sends
/// them as `GetMe`, `SendMessage` and so on
fn result(method: &str, params: &Value) -> Value {
    if method.eq_ignore_ascii_case("getMe") {
        let mut me = bot_user();
        me["can_join_groups"] = json!(true);
        me["can_read_all_group_messages"] = json!(false);
        me["supports_inline_queries"] = json!(false);
        me["can_connect_to_business"] = json!(false);
        me["has_main_web_app"] = json!(false);
        return me;
    }

    if ["sendMessage", "editMessageText"]
        .iter()
        .any(|name| method.eq_ignore_ascii_case(name))
    {
        let chat_id = params["chat_id"].as_i64().unwrap_or(1);
        return json!({
            "message_id": params["message_id"].as_i64().unwrap_or(1),
            "date": chrono::Utc::now().timestamp(),
            "chat": { "id": chat_id, "type": "private", "first_name": "LoadTestUser" },
            "from": bot_user(),
            "text": params["text"].as_str().unwrap_or_default(),
        });
    }

    json!(true)
}
