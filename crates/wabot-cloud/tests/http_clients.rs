use chrono::{TimeZone, Utc};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;
use wabot_cloud::{GeminiClient, HttpRunner, SupabaseStore};
use wabot_core::interfaces::{AccountStore, ChatBackend, RunnerApi};
use wabot_core::types::{
    BotAccount, BotConfig, ChatTurn, ConnectionStatus, Sender, ServerStatus, StoreConfig,
    UpdateConfigRequest,
};
use wabot_core::AppError;

fn pizzeria() -> BotAccount {
    BotAccount {
        id: "1733100000000".into(),
        instance_id: "692C275AE02BB".into(),
        user_id: "admin_master_id".into(),
        phone_number: "+39 333 0000000".into(),
        name: "Pizzeria".into(),
        is_active: true,
        status: ConnectionStatus::Connected,
        config: BotConfig {
            system_instruction: "Take pizza orders.".into(),
            temperature: 0.5,
        },
        avatar_color: "bg-blue-600".into(),
        last_active: Some(Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap()),
        server_status: ServerStatus::Online,
        messages_count: 12,
    }
}

fn store_for(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(&StoreConfig {
        url: server.base_url(),
        key: "anon-key".into(),
    })
    .unwrap()
}

// --- Table store ---

#[tokio::test]
async fn store_loads_rows_for_the_token() {
    let server = MockServer::start_async().await;
    let account = pizzeria();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/bot_nodes")
                .query_param("select", "*")
                .query_param("user_token", "eq.secret")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer anon-key");
            then.status(200).json_body(json!([
                { "id": account.id, "user_token": "secret", "data": account },
                { "id": "broken", "user_token": "secret", "data": { "name": 5 } }
            ]));
        })
        .await;

    let loaded = store_for(&server).load_accounts("secret").await.unwrap();
    mock.assert_calls(1);
    assert_eq!(loaded, vec![pizzeria()]);
}

#[tokio::test]
async fn store_upserts_with_merge_duplicates() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/bot_nodes")
                .header_exists("prefer")
                .body_includes("\"user_token\":\"secret\"")
                .body_includes("\"instanceId\":\"692C275AE02BB\"");
            then.status(201);
        })
        .await;

    store_for(&server)
        .save_account("secret", &pizzeria())
        .await
        .unwrap();
    mock.assert_calls(1);
}

#[tokio::test]
async fn store_deletes_by_id_and_reports_failures() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/bot_nodes")
                .query_param("id", "eq.1733100000000");
            then.status(500).body("boom");
        })
        .await;

    let err = store_for(&server)
        .delete_account("1733100000000")
        .await
        .unwrap_err();
    mock.assert_calls(1);
    match err {
        AppError::Store(msg) => assert!(msg.contains("boom"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

// --- Runner ---

#[tokio::test]
async fn runner_status_poll() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/qr");
            then.status(200).json_body(json!({
                "qr": "data:image/png;base64,AAAA",
                "status": "SCAN_NEEDED",
                "logs": ["[10:00:00] QR ready"],
                "isActive": true,
                "instanceId": "692C275AE02BB"
            }));
        })
        .await;

    let runner = HttpRunner::new().unwrap();
    let status = runner
        .fetch_status(&format!("{}/", server.base_url()))
        .await
        .unwrap();
    mock.assert_calls(1);
    assert_eq!(status.status, "SCAN_NEEDED");
    assert_eq!(status.instance_id.as_deref(), Some("692C275AE02BB"));
    assert_eq!(status.logs.len(), 1);
}

#[tokio::test]
async fn runner_push_config_and_logout() {
    let server = MockServer::start_async().await;
    let update = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/update-config")
                .json_body(json!({
                    "systemInstruction": "Be brief",
                    "temperature": 0.5,
                    "isActive": false
                }));
            then.status(200)
                .json_body(json!({ "success": true, "message": "Config updated" }));
        })
        .await;
    let logout = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/logout");
            then.status(200).json_body(json!({ "success": true }));
        })
        .await;

    let runner = HttpRunner::new().unwrap();
    let ack = runner
        .push_config(
            &server.base_url(),
            &UpdateConfigRequest {
                system_instruction: "Be brief".into(),
                temperature: 0.5,
                is_active: false,
            },
        )
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.message.as_deref(), Some("Config updated"));

    assert!(runner.logout(&server.base_url()).await.unwrap().success);
    update.assert_calls(1);
    logout.assert_calls(1);
}

#[tokio::test]
async fn runner_non_success_status_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/qr");
            then.status(502).body("Bad Gateway");
        })
        .await;

    let err = HttpRunner::new()
        .unwrap()
        .fetch_status(&server.base_url())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Runner(_)));
}

// --- Chat model ---

#[tokio::test]
async fn gemini_sends_history_and_reads_reply() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash:generateContent")
                .header("x-goog-api-key", "gk")
                .body_includes("\"systemInstruction\":{\"parts\":[{\"text\":\"Take pizza orders.\"}]}")
                .body_includes("\"role\":\"model\"")
                .body_includes("\"text\":\"A margherita please\"");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Coming right up" }, { "text": "!" }] }
                }]
            }));
        })
        .await;

    let client = GeminiClient::new("gk")
        .unwrap()
        .with_api_base(server.base_url());
    let history = vec![
        ChatTurn {
            sender: Sender::User,
            text: "Hi".into(),
        },
        ChatTurn {
            sender: Sender::Bot,
            text: "Hello! What can I get you?".into(),
        },
    ];
    let reply = client
        .reply(&pizzeria().config, &history, "A margherita please")
        .await
        .unwrap();
    mock.assert_calls(1);
    assert_eq!(reply, "Coming right up!");
}

#[tokio::test]
async fn gemini_error_status_maps_to_chat_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(429).body("quota");
        })
        .await;

    let client = GeminiClient::new("gk")
        .unwrap()
        .with_model("gemini-test")
        .with_api_base(server.base_url());
    let err = client
        .reply(&pizzeria().config, &[], "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Chat(_)));
}
