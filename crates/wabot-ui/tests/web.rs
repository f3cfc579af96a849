use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use tower::ServiceExt;
use wabot_core::config::{Settings, MAX_ACCOUNTS};
use wabot_core::interfaces::{AccountStore, ChatBackend, RunnerApi};
use wabot_core::memory::{MemoryPrefs, MemoryStore};
use wabot_core::types::{
    BotConfig, ChatTurn, QrStatus, RunnerAck, StoreConfig, UpdateConfigRequest,
};
use wabot_core::AppError;
use wabot_ui::web::{router, Console, ConsoleDeps, StoreFactory};

const TOKEN: &str = "ALPHA-1409";

/// Runner that is never reachable.
struct OfflineRunner;

#[async_trait]
impl RunnerApi for OfflineRunner {
    async fn fetch_status(&self, _base_url: &str) -> Result<QrStatus, AppError> {
        Err(AppError::Runner("connection refused".into()))
    }

    async fn push_config(
        &self,
        _base_url: &str,
        _request: &UpdateConfigRequest,
    ) -> Result<RunnerAck, AppError> {
        Err(AppError::Runner("connection refused".into()))
    }

    async fn logout(&self, _base_url: &str) -> Result<RunnerAck, AppError> {
        Err(AppError::Runner("connection refused".into()))
    }
}

/// Runner whose logout hangs until the test releases it.
#[derive(Default)]
struct StalledRunner {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RunnerApi for StalledRunner {
    async fn fetch_status(&self, _base_url: &str) -> Result<QrStatus, AppError> {
        Err(AppError::Runner("connection refused".into()))
    }

    async fn push_config(
        &self,
        _base_url: &str,
        _request: &UpdateConfigRequest,
    ) -> Result<RunnerAck, AppError> {
        Err(AppError::Runner("connection refused".into()))
    }

    async fn logout(&self, _base_url: &str) -> Result<RunnerAck, AppError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(RunnerAck {
            success: true,
            message: None,
        })
    }
}

struct EchoChat;

#[async_trait]
impl ChatBackend for EchoChat {
    async fn reply(
        &self,
        _config: &BotConfig,
        _history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AppError> {
        Ok(format!("echo: {message}"))
    }
}

fn app() -> (Router, Arc<MemoryStore>) {
    app_with(Arc::new(OfflineRunner))
}

fn app_with(runner: Arc<dyn RunnerApi>) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let shared = store.clone();
    let store_factory: StoreFactory = Arc::new(
        move |_cfg: &StoreConfig| -> Result<Arc<dyn AccountStore>, AppError> { Ok(shared.clone()) },
    );
    let console = Console::new(ConsoleDeps {
        settings: Settings::new(TOKEN),
        prefs: Arc::new(MemoryPrefs::default()),
        runner,
        chat: Arc::new(EchoChat),
        store_factory,
    });
    (router(Arc::new(console)), store)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = call(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router) {
    let (status, _) = call_json(app, "POST", "/api/login", Some(json!({ "token": TOKEN }))).await;
    assert_eq!(status, StatusCode::OK);
}

async fn create(app: &Router, name: &str) -> (StatusCode, Value) {
    call_json(
        app,
        "POST",
        "/api/accounts",
        Some(json!({ "name": name, "phoneNumber": "+39 333 0000000" })),
    )
    .await
}

#[tokio::test]
async fn index_page_is_served() {
    let (app, _) = app();
    let (status, body) = call(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("WhatsApp Manager Pro"));
}

#[tokio::test]
async fn bad_token_is_rejected_and_api_stays_closed() {
    let (app, _) = app();
    let (status, body) =
        call_json(&app, "POST", "/api/login", Some(json!({ "token": "wrong" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid access token");

    let (status, _) = call_json(&app, "GET", "/api/session", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_accounts_are_listed_selected_and_stored() {
    let (app, store) = app();
    login(&app).await;

    let (status, acc) = create(&app, "Pizzeria Napoli").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(acc["status"], "disconnected");
    assert_eq!(acc["isActive"], true);

    let (status, session) = call_json(&app, "GET", "/api/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["accounts"].as_array().unwrap().len(), 1);
    assert_eq!(session["selectedId"], acc["id"]);
    assert_eq!(session["maxAccounts"], MAX_ACCOUNTS);
    assert_eq!(session["connectedCount"], 0);
    assert_eq!(store.len(), 1);

    let (status, _) = call_json(&app, "POST", "/api/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call_json(&app, "GET", "/api/session", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_past_the_cap_conflicts() {
    let (app, _) = app();
    login(&app).await;
    for i in 0..MAX_ACCOUNTS {
        let (status, _) = create(&app, &format!("Shop {i}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = create(&app, "One too many").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn blank_name_is_a_bad_request() {
    let (app, _) = app();
    login(&app).await;
    let (status, _) = create(&app, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn config_save_without_runner_is_local_only() {
    let (app, store) = app();
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria").await;
    let id = acc["id"].as_str().unwrap();

    let (status, saved) = call_json(
        &app,
        "PUT",
        &format!("/api/accounts/{id}/config"),
        Some(json!({ "systemInstruction": "Take pizza orders.", "temperature": 0.43 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["outcome"]["kind"], "local_only");
    assert_eq!(saved["config"]["systemInstruction"], "Take pizza orders.");
    assert_eq!(saved["config"]["runnerUrl"], Value::Null);
    assert_eq!(store.get(id).unwrap().config.temperature, 0.4);
}

#[tokio::test]
async fn config_push_failure_is_reported_but_saved() {
    let (app, store) = app();
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria").await;
    let id = acc["id"].as_str().unwrap();

    let (status, saved) = call_json(
        &app,
        "PUT",
        &format!("/api/accounts/{id}/config"),
        Some(json!({ "isActive": false, "runnerUrl": "https://pizzeria-bot.onrender.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["outcome"]["kind"], "remote_failed");
    assert_eq!(saved["config"]["runnerUrl"], "https://pizzeria-bot.onrender.com");
    assert!(!store.get(id).unwrap().is_active);
}

#[tokio::test]
async fn downloads_are_attachments() {
    let (app, _) = app();
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria Napoli").await;
    let id = acc["id"].as_str().unwrap();
    let instance = acc["instanceId"].as_str().unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/accounts/{id}/server.js"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"server.js\""
    );
    let js = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8(js.to_vec()).unwrap().contains(instance));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/accounts/{id}/bundle.tar.gz"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-checksum-sha256"].len(), 64);
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&format!("pizzeria_napoli_{instance}.tar.gz")));

    let (status, _) = call(&app, "GET", "/api/accounts/nope/package.json", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pairing_without_runner_url_shows_a_notice() {
    let (app, _) = app();
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria").await;

    let (status, snap) = call_json(
        &app,
        "POST",
        "/api/pairing/open",
        Some(json!({ "accountId": acc["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["step"], "choice");

    let (_, snap) = call_json(&app, "POST", "/api/pairing/production", None).await;
    assert_eq!(snap["step"], "production");
    assert!(snap["notice"].as_str().unwrap().contains("No runner URL"));

    let (status, _) = call_json(&app, "POST", "/api/pairing/adopt", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, snap) = call_json(&app, "POST", "/api/pairing/close", None).await;
    assert_eq!(snap["step"], "none");
}

#[tokio::test]
async fn chat_replies_only_when_connected_and_active() {
    let (app, _) = app();
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria").await;
    let id = acc["id"].as_str().unwrap();

    let (_, view) = call_json(
        &app,
        "POST",
        "/api/chat",
        Some(json!({ "accountId": id, "text": "hello" })),
    )
    .await;
    assert_eq!(view["willReply"], false);
    assert_eq!(view["transcript"].as_array().unwrap().len(), 1);

    let (status, _) = call_json(&app, "POST", &format!("/api/accounts/{id}/disconnect"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn store_override_can_be_saved_and_reset() {
    let (app, _) = app();
    let (_, view) = call_json(&app, "GET", "/api/store", None).await;
    assert_eq!(view["isOverride"], false);
    assert_eq!(view["keySet"], false);

    let (status, view) = call_json(
        &app,
        "PUT",
        "/api/store",
        Some(json!({ "url": "https://custom.supabase.co/", "key": "anon" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["url"], "https://custom.supabase.co");
    assert_eq!(view["isOverride"], true);

    let (status, _) = call_json(
        &app,
        "PUT",
        "/api/store",
        Some(json!({ "url": "ftp://nope", "key": "anon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, view) = call_json(&app, "DELETE", "/api/store", None).await;
    assert_eq!(view["isOverride"], false);
}

#[tokio::test]
async fn slow_runner_does_not_block_other_requests() {
    let runner = Arc::new(StalledRunner::default());
    let (app, _) = app_with(runner.clone());
    login(&app).await;
    let (_, acc) = create(&app, "Pizzeria").await;
    let id = acc["id"].as_str().unwrap().to_string();
    let (status, _) = call_json(
        &app,
        "PUT",
        &format!("/api/accounts/{id}/config"),
        Some(json!({ "runnerUrl": "https://pizzeria-bot.onrender.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let disconnect_uri = format!("/api/accounts/{id}/disconnect");
    let pending = tokio::spawn({
        let app = app.clone();
        async move { call_json(&app, "POST", &disconnect_uri, None).await }
    });
    runner.entered.notified().await;

    let (status, session) = timeout(Duration::from_secs(5), call_json(&app, "GET", "/api/session", None))
        .await
        .expect("session request waited on the runner");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["accounts"].as_array().unwrap().len(), 1);
    let (status, _) = timeout(Duration::from_secs(5), call_json(&app, "GET", "/api/pairing", None))
        .await
        .expect("pairing request waited on the runner");
    assert_eq!(status, StatusCode::OK);

    runner.release.notify_one();
    let (status, body) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["status"], "disconnected");
    assert!(body["remoteNotice"].is_null());
}
