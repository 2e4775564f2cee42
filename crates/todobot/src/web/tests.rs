use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::DateTime;
use tower::ServiceExt;
use url::Url;

use super::*;
use crate::auth::id_token::tests::make_token;
use crate::auth::LoginTokens;
use crate::bot::tests::RecordingMessenger;
use crate::bot::CREATED_REPLY;
use crate::dates::fixed_offset;
use crate::error::Error;
use crate::session::Session;
use crate::storage::Storage;
use crate::todo::Todo;
use crate::webhook::{sign, SIGNATURE_HEADER};

const CLIENT_ID: &str = "1234";
const CLIENT_SECRET: &str = "login-secret";
const CHANNEL_SECRET: &str = "channel-secret";

#[derive(Debug, Default)]
struct MockLogin {
    id_token: String,
    revoke_error: Option<String>,
    revoked: Mutex<Vec<String>>,
}

#[async_trait]
impl LoginProvider for MockLogin {
    fn authorize_url(&self, state: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            "https://login.example.com/authorize",
            &[("state", state)],
        )?)
    }

    async fn exchange(&self, code: &str) -> Result<LoginTokens> {
        if code != "good-code" {
            return Err(Error::api("token", 400, "invalid code"));
        }
        Ok(LoginTokens {
            access_token: "access-token".to_string(),
            id_token: self.id_token.clone(),
        })
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        self.revoked.lock().unwrap().push(access_token.to_string());
        match &self.revoke_error {
            Some(body) => Err(Error::api("revoke", 400, body.clone())),
            None => Ok(()),
        }
    }
}

struct Harness {
    state: AppState,
    login: Arc<MockLogin>,
    messenger: Arc<RecordingMessenger>,
}

impl Harness {
    fn new() -> Self {
        Self::with(MockLogin::default(), None)
    }

    fn with(mut login: MockLogin, reminder_token: Option<&str>) -> Self {
        crate::logging::init_test_logging();

        let mut config = Config::default();
        config.bot.channel_secret = CHANNEL_SECRET.to_string();
        config.bot.edit_url = "https://todo.example.com".to_string();
        config.login.client_id = CLIENT_ID.to_string();
        config.login.client_secret = CLIENT_SECRET.to_string();
        config.session.secret = "cookie-secret".to_string();
        config.reminder.token = reminder_token.map(str::to_string);

        if login.id_token.is_empty() {
            login.id_token = make_token(CLIENT_SECRET, CLIENT_ID, "U1", 3600);
        }
        let login = Arc::new(login);
        let messenger = Arc::new(RecordingMessenger::default());
        let storage = SharedStorage::new(Storage::open_in_memory(fixed_offset(420).unwrap()).unwrap());
        let state = AppState::new(&config, storage, messenger.clone(), login.clone()).unwrap();

        Self {
            state,
            login,
            messenger,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        router(self.state.clone(), None).oneshot(request).await.unwrap()
    }

    fn cookie(&self, session: &Session) -> String {
        let jar = SignedCookieJar::new(self.state.key.clone());
        let jar = session.store(jar, &self.state.session).unwrap();
        set_cookie(&jar.into_response()).unwrap()
    }

    fn user_cookie(&self, user_id: &str) -> String {
        self.cookie(&Session {
            access_token: Some("access-token".to_string()),
            user_id: Some(user_id.to_string()),
            name: Some("Taro".to_string()),
            picture: Some("https://example.com/p.png".to_string()),
            ..Session::default()
        })
    }

    fn create(&self, user_id: &str, task: &str) -> i64 {
        self.state
            .storage
            .with(|s| s.create(user_id, task, due("2018-11-15T12:00:00+07:00")))
            .unwrap()
            .id
    }
}

fn due(s: &str) -> DateTime<chrono::FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// The `name=value` pair of the first `Set-Cookie` header.
fn set_cookie(response: &Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_index_serves_login_page_without_session() {
    let harness = Harness::new();
    let response = harness.send(get("/", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    assert_eq!(response.headers()[header::EXPIRES], "0");
    assert!(body_text(response).await.contains("Log in with LINE"));
}

#[tokio::test]
async fn test_index_serves_dashboard_with_session() {
    let harness = Harness::new();
    let cookie = harness.user_cookie("U1");
    let response = harness.send(get("/", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("/user-info"));
}

#[tokio::test]
async fn test_dashboard_orders_by_instant_not_text() {
    let harness = Harness::new();
    let cookie = harness.user_cookie("U1");
    let page = body_text(harness.send(get("/", Some(&cookie))).await).await;

    // Edited dues come back from the browser in UTC while loaded ones keep +07:00.
    assert!(page.contains("new Date(a.Due) - new Date(b.Due)"));
    assert!(!page.contains("a.Due < b.Due"));
}

#[tokio::test]
async fn test_login_flow() {
    let harness = Harness::new();

    let response = harness.send(get("/login", None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let redirect = Url::parse(location(&response)).unwrap();
    assert_eq!(redirect.host_str(), Some("login.example.com"));
    let (_, state) = redirect
        .query_pairs()
        .find(|(k, _)| k == "state")
        .unwrap();
    let cookie = set_cookie(&response).unwrap();

    let response = harness
        .send(get(
            &format!("/auth?code=good-code&state={state}"),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    let cookie = set_cookie(&response).unwrap();

    let response = harness.send(get("/user-info", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let info: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(info["oauthName"], "Taro");
    assert_eq!(info["oauthPicture"], "https://profile.line-scdn.net/abc");

    harness.create("U1", "Go shopping");
    let response = harness.send(get("/list", Some(&cookie))).await;
    let todos: Vec<Todo> = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(todos.len(), 1);
}

#[tokio::test]
async fn test_auth_rejects_state_mismatch() {
    let harness = Harness::new();
    let cookie = harness.cookie(&Session {
        state: Some("expected".to_string()),
        ..Session::default()
    });

    let response = harness
        .send(get("/auth?code=good-code&state=forged", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn test_auth_rejects_missing_stored_state() {
    let harness = Harness::new();
    let response = harness
        .send(get("/auth?code=good-code&state=anything", None))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn test_auth_exchange_failure_is_server_error() {
    let harness = Harness::new();
    let cookie = harness.cookie(&Session {
        state: Some("s".to_string()),
        ..Session::default()
    });

    let response = harness
        .send(get("/auth?code=bad-code&state=s", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("invalid code"));
}

#[tokio::test]
async fn test_auth_rejects_bad_id_token() {
    let harness = Harness::with(
        MockLogin {
            id_token: make_token("wrong-secret", CLIENT_ID, "U1", 3600),
            ..MockLogin::default()
        },
        None,
    );
    let cookie = harness.cookie(&Session {
        state: Some("s".to_string()),
        ..Session::default()
    });

    let response = harness
        .send(get("/auth?code=good-code&state=s", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_list_requires_session() {
    let harness = Harness::new();
    let response = harness.send(get("/list", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "unauthorized: user not found");
}

#[tokio::test]
async fn test_list_returns_only_own_todos() {
    let harness = Harness::new();
    harness.create("U1", "Mine");
    harness.create("U2", "Theirs");
    let cookie = harness.user_cookie("U1");

    let response = harness.send(get("/list", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let todos: Vec<serde_json::Value> = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["Task"], "Mine");
    assert_eq!(todos[0]["UserID"], "U1");
    assert_eq!(todos[0]["Due"], "2018-11-15T12:00:00+07:00");
}

#[tokio::test]
async fn test_pin_and_done() {
    let harness = Harness::new();
    let id = harness.create("U1", "Go shopping");
    let cookie = harness.user_cookie("U1");

    let response = harness
        .send(post_json("/pin", Some(&cookie), &format!(r#"{{"ID":{id},"Pin":true}}"#)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .send(post_json("/done", Some(&cookie), &format!(r#"{{"ID":{id},"Done":true}}"#)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let todo = harness.state.storage.with(|s| s.get(id)).unwrap().unwrap();
    assert!(todo.pin);
    assert!(todo.done);
}

#[tokio::test]
async fn test_edit_and_delete() {
    let harness = Harness::new();
    let id = harness.create("U1", "Go shopping");
    let cookie = harness.user_cookie("U1");

    let body = format!(r#"{{"ID":{id},"Task":" Buy milk ","Due":"2018-11-20T08:00:00.000Z"}}"#);
    let response = harness.send(post_json("/edit", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let todo = harness.state.storage.with(|s| s.get(id)).unwrap().unwrap();
    assert_eq!(todo.task, "Buy milk");
    assert_eq!(todo.due, due("2018-11-20T15:00:00+07:00"));

    let response = harness
        .send(post_json("/delete", Some(&cookie), &format!(r#"{{"ID":{id}}}"#)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness.state.storage.with(|s| s.get(id)).unwrap().is_none());
}

#[tokio::test]
async fn test_mutations_reject_other_users_todos() {
    let harness = Harness::new();
    let id = harness.create("U2", "Theirs");
    let cookie = harness.user_cookie("U1");

    let response = harness
        .send(post_json("/delete", Some(&cookie), &format!(r#"{{"ID":{id}}}"#)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_text(response).await,
        format!("no record: todo {id} not found")
    );
    assert!(harness.state.storage.with(|s| s.get(id)).unwrap().is_some());
}

#[tokio::test]
async fn test_mutations_reject_bad_input() {
    let harness = Harness::new();
    let id = harness.create("U1", "Go shopping");
    let cookie = harness.user_cookie("U1");

    let response = harness
        .send(post_json("/pin", Some(&cookie), "not json"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = format!(r#"{{"ID":{id},"Task":"   ","Due":"2018-11-20T08:00:00Z"}}"#);
    let response = harness.send(post_json("/edit", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .send(post_json("/done", None, &format!(r#"{{"ID":{id},"Done":true}}"#)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_info_requires_profile() {
    let harness = Harness::new();
    let response = harness.send(get("/user-info", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_and_clears_session() {
    let harness = Harness::new();
    let cookie = harness.user_cookie("U1");

    let response = harness.send(get("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    assert_eq!(
        harness.login.revoked.lock().unwrap().as_slice(),
        ["access-token".to_string()]
    );

    let removal = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(removal.starts_with("session=;"));
}

#[tokio::test]
async fn test_logout_without_session_skips_revoke() {
    let harness = Harness::new();
    let response = harness.send(get("/logout", None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(harness.login.revoked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_revoke_failure() {
    let harness = Harness::with(
        MockLogin {
            revoke_error: Some("invalid access token".to_string()),
            ..MockLogin::default()
        },
        None,
    );
    let cookie = harness.user_cookie("U1");

    let response = harness.send(get("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("invalid access token"));
}

fn webhook(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/callback")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const WEBHOOK_BODY: &str = r#"{"destination":"Ubot","events":[{"type":"message","replyToken":"r1","source":{"type":"user","userId":"U1"},"message":{"id":"1","type":"text","text":"Go shopping : tomorrow : 18:00"}}]}"#;

#[tokio::test]
async fn test_callback_creates_task_and_replies() {
    let harness = Harness::new();
    let signature = sign(CHANNEL_SECRET, WEBHOOK_BODY.as_bytes());

    let response = harness.send(webhook(WEBHOOK_BODY, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let todos = harness.state.storage.with(|s| s.list("U1")).unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].task, "Go shopping");
    assert_eq!(
        harness.messenger.replies.lock().unwrap().as_slice(),
        [("r1".to_string(), CREATED_REPLY.to_string())]
    );
}

#[tokio::test]
async fn test_callback_rejects_bad_signature() {
    let harness = Harness::new();

    let response = harness.send(webhook(WEBHOOK_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let forged = sign("other-secret", WEBHOOK_BODY.as_bytes());
    let response = harness.send(webhook(WEBHOOK_BODY, Some(forged))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(harness.state.storage.with(|s| s.count()).unwrap(), 0);
    assert!(harness.messenger.replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_callback_rejects_malformed_body() {
    let harness = Harness::new();
    let signature = sign(CHANNEL_SECRET, b"not json");
    let response = harness.send(webhook("not json", Some(signature))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remind_without_token_guard() {
    let harness = Harness::new();
    harness.create("U1", "Go shopping");
    let response = harness.send(get("/remind", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_remind_with_token_guard() {
    let harness = Harness::with(MockLogin::default(), Some("cron-token"));

    let response = harness.send(get("/remind", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness.send(get("/remind?token=wrong", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness.send(get("/remind?token=cron-token", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_without_assets_is_not_found() {
    let harness = Harness::new();
    let response = harness.send(get("/nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
}

#[tokio::test]
async fn test_static_assets_fallback() {
    let harness = Harness::new();
    let dir = std::env::temp_dir().join(format!("todobot-assets-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("css")).unwrap();
    std::fs::write(dir.join("css/app.css"), "body {}").unwrap();

    let response = router(harness.state.clone(), Some(&dir))
        .oneshot(get("/css/app.css", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    assert_eq!(body_text(response).await, "body {}");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_reminder_token_matches() {
    use super::handlers::token_matches;

    assert!(token_matches("cron-token", Some("cron-token")));
    assert!(!token_matches("cron-token", Some("cron-tokem")));
    assert!(!token_matches("cron-token", Some("cron")));
    assert!(!token_matches("cron-token", Some("")));
    assert!(!token_matches("cron-token", None));
}
