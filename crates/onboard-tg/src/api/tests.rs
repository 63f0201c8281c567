use super::*;
use crate::db::MemoryDb;
use crate::referral::ReferralCodec;
use crate::user::test_util::user_id;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOT_TOKEN: &str = "12345:test-bot-token";
const REFERRAL_SECRET: &str = "referral-secret";

struct TestApi {
    db: MemoryDb,
    state: Arc<ApiState>,
}

impl TestApi {
    fn new() -> Self {
        let db = MemoryDb::default();
        let state = Arc::new(ApiState {
            db: Arc::new(db.clone()),
            tokens: TokenIssuer::new("jwt-secret", 60),
            init_data: InitDataValidator::new(BOT_TOKEN.to_owned(), 3600),
            referrals: Arc::new(ReferralService::new(ReferralCodec::new(REFERRAL_SECRET))),
            bot_username: "onboard_test_bot".to_owned(),
        });
        Self { db, state }
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = router(self.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.call(req.body(Body::empty()).unwrap()).await
    }

    async fn auth(&self, init_data: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "init_data": init_data }).to_string()))
            .unwrap();
        self.call(req).await
    }

    /// Signs in as the given Mini App user and returns the access token
    async fn login(&self, id: u64, start_param: Option<&str>) -> String {
        let user = json!({ "id": id, "first_name": format!("User{id}") }).to_string();
        let auth_date = chrono::Utc::now().timestamp().to_string();

        let mut fields = vec![("auth_date", auth_date.as_str()), ("user", user.as_str())];
        fields.extend(start_param.map(|param| ("start_param", param)));

        let (status, body) = self.auth(&self.state.init_data.sign(&fields)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["token_type"], "bearer");

        body["access_token"].as_str().unwrap().to_owned()
    }

    async fn referral_count(&self, id: u64) -> u32 {
        use crate::referral::UserStore;
        use crate::user::Database;

        self.db
            .session()
            .get_user(user_id(id))
            .await
            .unwrap()
            .unwrap()
            .referral_count
    }
}

#[tokio::test]
async fn health() {
    let api = TestApi::new();
    let (status, body) = api.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Service is healthy" }));
}

#[test_log::test(tokio::test)]
async fn referral_via_start_param_is_credited_once() {
    let api = TestApi::new();

    let referrer_token = api.login(111, None).await;
    let (status, referral) = api.get("/referral", Some(&referrer_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(referral["referral_count"], 0);

    let code = referral["referral_code"].as_str().unwrap();
    assert_eq!(
        referral["referral_link"],
        format!("https://t.me/onboard_test_bot?start=ref_{code}")
    );

    let start_param = format!("ref_{code}");
    api.login(222, Some(&start_param)).await;
    assert_eq!(api.referral_count(111).await, 1);

    // The second sign in of the same user must not be counted again
    api.login(222, Some(&start_param)).await;
    assert_eq!(api.referral_count(111).await, 1);

    let (_, referral) = api.get("/referral", Some(&referrer_token)).await;
    assert_eq!(referral["referral_count"], 1);
}

#[tokio::test]
async fn self_referral_is_ignored() {
    let api = TestApi::new();
    let code = ReferralCodec::new(REFERRAL_SECRET).encode(user_id(333));

    api.login(333, Some(&format!("ref_{code}"))).await;

    assert_eq!(api.referral_count(333).await, 0);
}

#[tokio::test]
async fn profile() {
    let api = TestApi::new();
    let token = api.login(444, None).await;

    let (status, body) = api.get("/users/profile", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "id": 444,
            "first_name": "User444",
            "last_name": null,
            "username": null,
            "bio": null,
            "language_code": null,
        })
    );
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let api = TestApi::new();
    let token = api.state.tokens.issue(user_id(42), chrono::Utc::now()).unwrap();

    let (status, body) = api.get("/users/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "User 42 not found", "status_code": 404 }));

    let (status, _) = api.get("/referral", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unauthorized() {
    let api = TestApi::new();

    let (status, body) = api.get("/users/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Not authenticated", "status_code": 401 }));

    let (status, body) = api.get("/referral", Some("not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Invalid token", "status_code": 401 }));
}

#[tokio::test]
async fn tampered_init_data() {
    let api = TestApi::new();
    let init_data = api.state.init_data.sign(&[("auth_date", "1700000000")]);
    let tampered = init_data.replace("auth_date=1700000000", "auth_date=1700000001");

    let (status, body) = api.auth(&tampered).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "detail": "Invalid init data: signature mismatch", "status_code": 401 })
    );
}
