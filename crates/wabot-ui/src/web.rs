use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wabot_core::auth::AuthGate;
use wabot_core::config::{Settings, STORE_CONFIG_KEY};
use wabot_core::editor::SaveOutcome;
use wabot_core::error::AppError;
use wabot_core::interfaces::{AccountStore, ChatBackend, Preferences, RunnerApi};
use wabot_core::pairing::{PairingFlow, PairingSnapshot};
use wabot_core::prefs;
use wabot_core::session::{Services, Session};
use wabot_core::simulator::ChatSimulator;
use wabot_core::types::{BotAccount, ChatMessage, SessionUser, StoreConfig};
use wabot_provision::{bundle, guide, package_json, server_js};

// ── Shared state ────────────────────────────────────────────────────────────

/// Builds the account store for the effective store configuration.
pub type StoreFactory =
    Arc<dyn Fn(&StoreConfig) -> Result<Arc<dyn AccountStore>, AppError> + Send + Sync>;

pub struct ConsoleDeps {
    pub settings: Settings,
    pub prefs: Arc<dyn Preferences>,
    pub runner: Arc<dyn RunnerApi>,
    pub chat: Arc<dyn ChatBackend>,
    pub store_factory: StoreFactory,
}

/// Handles into the logged-in session. Handlers work on a clone so the
/// console lock is never held across a store, runner or chat call.
#[derive(Clone)]
struct Active {
    session: Session,
    pairing: Arc<Mutex<PairingFlow>>,
    pairing_rx: watch::Receiver<PairingSnapshot>,
    chat: Arc<Mutex<ChatSimulator>>,
}

impl Active {
    fn pairing_snapshot(&self) -> PairingSnapshot {
        self.pairing_rx.borrow().clone()
    }
}

/// The web console: one logged-in operator at a time.
pub struct Console {
    deps: ConsoleDeps,
    gate: AuthGate,
    active: Mutex<Option<Active>>,
}

type Shared = Arc<Console>;

impl Console {
    pub fn new(deps: ConsoleDeps) -> Self {
        let gate = AuthGate::new(
            deps.settings.master_token.clone(),
            deps.settings.admin_name.clone(),
        );
        Self {
            deps,
            gate,
            active: Mutex::new(None),
        }
    }

    fn services(&self) -> Result<Services, AppError> {
        let cfg = prefs::store_config(self.deps.prefs.as_ref(), &self.deps.settings)?;
        Ok(Services {
            store: (self.deps.store_factory)(&cfg)?,
            runner: self.deps.runner.clone(),
            chat: self.deps.chat.clone(),
            prefs: self.deps.prefs.clone(),
        })
    }

    fn activate(session: Session) -> Active {
        let pairing = session.pairing();
        Active {
            pairing_rx: pairing.subscribe(),
            pairing: Arc::new(Mutex::new(pairing)),
            chat: Arc::new(Mutex::new(session.chat())),
            session,
        }
    }

    async fn current(&self) -> Result<Active, AppError> {
        self.active.lock().await.clone().ok_or(AppError::NotLoggedIn)
    }

    /// Pick up a session persisted by an earlier login, if any.
    pub async fn resume(&self) -> Result<bool, AppError> {
        let session = Session::resume(self.services()?, &self.gate, &self.deps.settings).await?;
        let resumed = session.is_some();
        *self.active.lock().await = session.map(Self::activate);
        Ok(resumed)
    }

    /// Rebuild the session against the current store configuration.
    async fn restart(&self) -> Result<(), AppError> {
        let was_active = self.active.lock().await.take().is_some();
        if was_active {
            self.resume().await?;
        }
        Ok(())
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidToken | AppError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AppError::UnknownAccount(_) => StatusCode::NOT_FOUND,
            AppError::AccountLimit(_) => StatusCode::CONFLICT,
            AppError::MissingParam(_)
            | AppError::InvalidStoreConfig(_)
            | AppError::MissingRunnerUrl(_)
            | AppError::NothingToSave
            | AppError::NoAccounts
            | AppError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Runner(_) | AppError::Chat(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Request / Response types ────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest {
    name: String,
    phone_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigUpdate {
    system_instruction: Option<String>,
    temperature: Option<f32>,
    is_active: Option<bool>,
    runner_url: Option<String>,
    #[serde(default)]
    reset_instruction: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenPairingRequest {
    account_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunnerUrlRequest {
    runner_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    account_id: String,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    user: SessionUser,
    accounts: Vec<BotAccount>,
    selected_id: Option<String>,
    sync_error: Option<String>,
    pending_writes: usize,
    max_accounts: usize,
    connected_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView {
    account_id: String,
    system_instruction: String,
    temperature: f32,
    is_active: bool,
    runner_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveView {
    outcome: Option<SaveOutcome>,
    config: ConfigView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatView {
    account_id: Option<String>,
    will_reply: bool,
    transcript: Vec<ChatMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreView {
    url: String,
    key_set: bool,
    is_override: bool,
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn router(console: Shared) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/session", get(session_handler))
        .route("/api/sync", post(sync_handler))
        .route("/api/sync/dismiss", post(dismiss_sync_handler))
        .route("/api/accounts", post(create_account_handler))
        .route("/api/accounts/{id}", delete(delete_account_handler))
        .route("/api/accounts/{id}/select", post(select_account_handler))
        .route("/api/accounts/{id}/config", get(get_config_handler).put(save_config_handler))
        .route("/api/accounts/{id}/disconnect", post(disconnect_handler))
        .route("/api/accounts/{id}/server.js", get(server_js_handler))
        .route("/api/accounts/{id}/package.json", get(package_json_handler))
        .route("/api/accounts/{id}/guide", get(guide_handler))
        .route("/api/accounts/{id}/bundle.tar.gz", get(bundle_handler))
        .route("/api/pairing", get(pairing_snapshot_handler))
        .route("/api/pairing/open", post(pairing_open_handler))
        .route("/api/pairing/production", post(pairing_production_handler))
        .route("/api/pairing/simulator", post(pairing_simulator_handler))
        .route("/api/pairing/runner-url", put(pairing_runner_url_handler))
        .route("/api/pairing/adopt", post(pairing_adopt_handler))
        .route("/api/pairing/reset", post(pairing_reset_handler))
        .route("/api/pairing/back", post(pairing_back_handler))
        .route("/api/pairing/close", post(pairing_close_handler))
        .route("/api/pairing/events", get(pairing_events_handler))
        .route("/api/chat", get(chat_handler).post(chat_send_handler))
        .route(
            "/api/store",
            get(store_handler).put(save_store_handler).delete(reset_store_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(console)
}

pub async fn run(console: Shared, port: u16) -> anyhow::Result<()> {
    if console.resume().await? {
        info!("resumed persisted session");
    }
    let app = router(console);

    let addr = format!("0.0.0.0:{port}");
    println!("wabot web console running at http://localhost:{port}");
    println!("Press Ctrl+C to stop.\n");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────────

async fn session_view(active: &Active) -> SessionView {
    let registry = active.session.registry();
    let reg = registry.lock().await;
    SessionView {
        user: active.session.user().clone(),
        accounts: reg.accounts().to_vec(),
        selected_id: reg.selected().map(|a| a.id.clone()),
        sync_error: reg.sync_error().map(str::to_string),
        pending_writes: reg.pending_writes().len(),
        max_accounts: reg.max_accounts(),
        connected_count: reg.connected_count(),
    }
}

async fn account(active: &Active, id: &str) -> Result<BotAccount, AppError> {
    let registry = active.session.registry();
    let reg = registry.lock().await;
    Ok(reg.require(id)?.clone())
}

async fn config_view(active: &Active, id: &str) -> Result<ConfigView, AppError> {
    let acc = account(active, id).await?;
    Ok(ConfigView {
        account_id: acc.id.clone(),
        system_instruction: acc.config.system_instruction,
        temperature: acc.config.temperature,
        is_active: acc.is_active,
        runner_url: active.session.runner_url(id)?,
    })
}

fn chat_view(chat: &ChatSimulator, account: Option<&BotAccount>) -> ChatView {
    ChatView {
        account_id: chat.account_id().map(str::to_string),
        will_reply: account.is_some_and(ChatSimulator::will_reply),
        transcript: chat.transcript().to_vec(),
    }
}

fn download(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

// ── Route handlers ──────────────────────────────────────────────────────────

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn login_handler(
    State(console): State<Shared>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionView>> {
    let session = Session::login(
        console.services()?,
        &console.gate,
        &console.deps.settings,
        &req.token,
    )
    .await?;
    let fresh = Console::activate(session);
    let view = session_view(&fresh).await;
    *console.active.lock().await = Some(fresh);
    Ok(Json(view))
}

async fn logout_handler(State(console): State<Shared>) -> ApiResult<StatusCode> {
    let old = console.active.lock().await.take();
    match old {
        Some(old) => old.session.logout(&console.gate)?,
        None => console.gate.logout(console.deps.prefs.as_ref())?,
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn session_handler(State(console): State<Shared>) -> ApiResult<Json<SessionView>> {
    let active = console.current().await?;
    Ok(Json(session_view(&active).await))
}

/// Retry from the sync banner: reload, then flush queued writes.
async fn sync_handler(State(console): State<Shared>) -> ApiResult<Json<SessionView>> {
    let active = console.current().await?;
    {
        let registry = active.session.registry();
        let mut reg = registry.lock().await;
        if reg.load().await.is_ok() && !reg.pending_writes().is_empty() {
            let flushed = reg.flush_pending().await;
            info!(flushed, "pending writes retried");
        }
    }
    Ok(Json(session_view(&active).await))
}

async fn dismiss_sync_handler(State(console): State<Shared>) -> ApiResult<Json<SessionView>> {
    let active = console.current().await?;
    active.session.registry().lock().await.dismiss_sync_error();
    Ok(Json(session_view(&active).await))
}

async fn create_account_handler(
    State(console): State<Shared>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<BotAccount>)> {
    let active = console.current().await?;
    let account = active
        .session
        .create_account(&req.name, &req.phone_number)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn delete_account_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let active = console.current().await?;
    let pairing_this = active.pairing_snapshot().account_id.as_deref() == Some(id.as_str());
    if pairing_this {
        active.pairing.lock().await.close();
    }
    active.session.delete_account(&id).await?;
    Ok(Json(session_view(&active).await))
}

async fn select_account_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let active = console.current().await?;
    active.session.registry().lock().await.select(&id)?;
    active.chat.lock().await.switch_account(&id);
    Ok(Json(session_view(&active).await))
}

async fn get_config_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConfigView>> {
    let active = console.current().await?;
    Ok(Json(config_view(&active, &id).await?))
}

async fn save_config_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
    Json(req): Json<ConfigUpdate>,
) -> ApiResult<Json<SaveView>> {
    let active = console.current().await?;

    if let Some(url) = &req.runner_url {
        active.session.set_runner_url(&id, url)?;
    }

    let mut editor = active.session.editor(&id).await?;
    if req.reset_instruction {
        editor.reset_instruction();
    } else if let Some(text) = req.system_instruction {
        editor.set_instruction(text);
    }
    if let Some(t) = req.temperature {
        editor.set_temperature(t);
    }
    if let Some(a) = req.is_active {
        editor.set_active(a);
    }

    let outcome = if editor.can_save() {
        Some(active.session.save_config(&mut editor).await?)
    } else {
        None
    };
    Ok(Json(SaveView {
        outcome,
        config: config_view(&active, &id).await?,
    }))
}

async fn disconnect_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let active = console.current().await?;
    let outcome = active.session.disconnect(&id).await?;
    Ok(Json(json!({
        "account": outcome.account,
        "remoteNotice": outcome.remote_notice,
    })))
}

async fn server_js_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let acc = account(&console.current().await?, &id).await?;
    Ok(download(
        "application/javascript; charset=utf-8",
        "server.js",
        server_js::generate(&acc).into_bytes(),
    ))
}

async fn package_json_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    account(&console.current().await?, &id).await?;
    Ok(download(
        "application/json",
        "package.json",
        package_json::generate().into_bytes(),
    ))
}

async fn guide_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let acc = account(&console.current().await?, &id).await?;
    Ok(download(
        "text/markdown; charset=utf-8",
        "DEPLOY.md",
        guide::render(&acc).into_bytes(),
    ))
}

async fn bundle_handler(
    State(console): State<Shared>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let acc = account(&console.current().await?, &id).await?;
    let bytes = bundle::build(&acc)?;
    let checksum = bundle::sha256_hex(&bytes);
    let mut resp = download("application/gzip", &bundle::file_name(&acc), bytes);
    if let Ok(value) = checksum.parse() {
        resp.headers_mut().insert("x-checksum-sha256", value);
    }
    Ok(resp)
}

async fn pairing_snapshot_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    Ok(Json(console.current().await?.pairing_snapshot()))
}

async fn pairing_open_handler(
    State(console): State<Shared>,
    Json(req): Json<OpenPairingRequest>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let url = active.session.runner_url(&req.account_id)?;
    let mut flow = active.pairing.lock().await;
    flow.open(&req.account_id, url).await?;
    Ok(Json(flow.snapshot()))
}

async fn pairing_production_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    flow.choose_production()?;
    Ok(Json(flow.snapshot()))
}

async fn pairing_simulator_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    flow.choose_simulator()?;
    Ok(Json(flow.snapshot()))
}

async fn pairing_runner_url_handler(
    State(console): State<Shared>,
    Json(req): Json<RunnerUrlRequest>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    let account_id = flow
        .snapshot()
        .account_id
        .ok_or_else(|| AppError::MissingParam("accountId".into()))?;
    active.session.set_runner_url(&account_id, &req.runner_url)?;
    flow.set_runner_url(active.session.runner_url(&account_id)?);
    Ok(Json(flow.snapshot()))
}

async fn pairing_adopt_handler(State(console): State<Shared>) -> ApiResult<Json<BotAccount>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    let account = flow.adopt_existing().await?;
    Ok(Json(account))
}

async fn pairing_reset_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    flow.force_reset().await?;
    Ok(Json(flow.snapshot()))
}

async fn pairing_back_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    flow.back()?;
    Ok(Json(flow.snapshot()))
}

async fn pairing_close_handler(
    State(console): State<Shared>,
) -> ApiResult<Json<PairingSnapshot>> {
    let active = console.current().await?;
    let mut flow = active.pairing.lock().await;
    flow.close();
    Ok(Json(flow.snapshot()))
}

async fn pairing_events_handler(
    State(console): State<Shared>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, axum::Error>>>> {
    let rx = console.current().await?.pairing_rx;
    let stream = WatchStream::new(rx).map(|snap| Event::default().json_data(snap));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn chat_handler(State(console): State<Shared>) -> ApiResult<Json<ChatView>> {
    let active = console.current().await?;
    let chat = active.chat.lock().await;
    let current = match chat.account_id() {
        Some(id) => account(&active, id).await.ok(),
        None => None,
    };
    Ok(Json(chat_view(&chat, current.as_ref())))
}

async fn chat_send_handler(
    State(console): State<Shared>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatView>> {
    let active = console.current().await?;
    let acc = account(&active, &req.account_id).await?;
    let mut chat = active.chat.lock().await;
    chat.send(&acc, &req.text).await;
    Ok(Json(chat_view(&chat, Some(&acc))))
}

async fn store_handler(State(console): State<Shared>) -> ApiResult<Json<StoreView>> {
    let prefs = console.deps.prefs.as_ref();
    let cfg = prefs::store_config(prefs, &console.deps.settings)?;
    Ok(Json(StoreView {
        url: cfg.url,
        key_set: !cfg.key.is_empty(),
        is_override: prefs.get(STORE_CONFIG_KEY)?.is_some(),
    }))
}

async fn save_store_handler(
    State(console): State<Shared>,
    Json(cfg): Json<StoreConfig>,
) -> ApiResult<Json<StoreView>> {
    prefs::save_store_config(console.deps.prefs.as_ref(), &cfg)?;
    console.restart().await?;
    store_handler(State(console)).await
}

async fn reset_store_handler(State(console): State<Shared>) -> ApiResult<Json<StoreView>> {
    prefs::reset_store_config(console.deps.prefs.as_ref(), &console.deps.settings)?;
    console.restart().await?;
    store_handler(State(console)).await
}

// ── Embedded HTML ───────────────────────────────────────────────────────────

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en" class="dark">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>WhatsApp Manager Pro</title>
<script src="https://cdn.tailwindcss.com"></script>
<script>
tailwind.config = { darkMode: 'class' }
</script>
<style>
  #logs::-webkit-scrollbar, #transcript::-webkit-scrollbar { width: 8px; }
  #logs::-webkit-scrollbar-thumb, #transcript::-webkit-scrollbar-thumb { background: #334155; border-radius: 4px; }
</style>
</head>
<body class="bg-slate-950 text-slate-200 min-h-screen">

<!-- Header -->
<header class="border-b border-slate-800 bg-slate-950/80 backdrop-blur sticky top-0 z-10">
  <div class="max-w-5xl mx-auto px-6 py-4 flex items-center gap-3">
    <h1 class="text-xl font-bold tracking-tight text-emerald-400">WhatsApp Manager Pro</h1>
    <span id="user-label" class="text-sm text-slate-500 ml-2"></span>
    <div class="ml-auto flex gap-2">
      <button id="store-btn" class="hidden text-sm px-3 py-1.5 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="openStore()">Store</button>
      <button id="logout-btn" class="hidden text-sm px-3 py-1.5 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="logout()">Log out</button>
    </div>
  </div>
</header>

<main class="max-w-5xl mx-auto px-6 py-8 space-y-6">

<!-- Login -->
<div id="login-card" class="max-w-md mx-auto bg-slate-900 border border-slate-800 rounded-xl p-6 shadow-xl">
  <h2 class="text-lg font-semibold mb-4">Administrator access</h2>
  <form onsubmit="login(event)" class="space-y-4">
    <input type="password" id="token" placeholder="Access token" class="w-full bg-slate-800 border border-slate-700 rounded-lg px-4 py-2.5 focus:outline-none focus:ring-2 focus:ring-emerald-500">
    <p id="login-error" class="text-sm text-red-400 hidden"></p>
    <button class="w-full py-2.5 rounded-lg bg-emerald-600 hover:bg-emerald-500 font-semibold">Log in</button>
  </form>
</div>

<!-- Dashboard -->
<div id="dashboard" class="hidden space-y-6">
  <div id="sync-banner" class="hidden bg-red-950 border border-red-800 rounded-xl p-4 flex items-center gap-3">
    <span id="sync-text" class="text-sm text-red-300 flex-1"></span>
    <button class="text-sm px-3 py-1.5 rounded-lg bg-red-800 hover:bg-red-700" onclick="retrySync()">Retry</button>
    <button class="text-sm px-3 py-1.5 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="dismissSync()">Dismiss</button>
  </div>

  <div class="bg-slate-900 border border-slate-800 rounded-xl p-6">
    <div class="flex items-center mb-4">
      <h2 class="text-lg font-semibold">Accounts</h2>
      <span id="counts" class="text-sm text-slate-500 ml-3"></span>
    </div>
    <div id="accounts" class="grid gap-3 md:grid-cols-2"></div>
    <form id="create-form" onsubmit="createAccount(event)" class="mt-6 flex flex-wrap gap-3">
      <input id="new-name" placeholder="Business name" class="flex-1 bg-slate-800 border border-slate-700 rounded-lg px-3 py-2">
      <input id="new-phone" placeholder="Phone number" class="flex-1 bg-slate-800 border border-slate-700 rounded-lg px-3 py-2">
      <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500">Add account</button>
    </form>
    <p id="create-error" class="text-sm text-red-400 mt-2 hidden"></p>
  </div>

  <!-- Editor -->
  <div id="editor" class="hidden bg-slate-900 border border-slate-800 rounded-xl p-6 space-y-4">
    <h2 class="text-lg font-semibold">Bot configuration <span id="editor-name" class="text-slate-500"></span></h2>
    <textarea id="instruction" rows="6" class="w-full bg-slate-800 border border-slate-700 rounded-lg px-3 py-2 font-mono text-sm"></textarea>
    <div class="flex flex-wrap items-center gap-4">
      <label class="text-sm">Temperature <span id="temp-label"></span>
        <input id="temperature" type="range" min="0" max="1" step="0.1" oninput="document.getElementById('temp-label').textContent=this.value">
      </label>
      <label class="text-sm flex items-center gap-2"><input id="active" type="checkbox"> Bot active</label>
      <input id="runner-url" placeholder="https://your-bot.onrender.com" class="flex-1 bg-slate-800 border border-slate-700 rounded-lg px-3 py-2 text-sm">
    </div>
    <div class="flex flex-wrap gap-2">
      <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500" onclick="saveConfig(false)">Save</button>
      <button class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="saveConfig(true)">Restore default prompt</button>
      <button class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="openPairing()">Connect</button>
      <button class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="disconnect()">Disconnect</button>
      <a id="dl-server" class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700">server.js</a>
      <a id="dl-package" class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700">package.json</a>
      <a id="dl-guide" class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700">Deploy guide</a>
      <a id="dl-bundle" class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700">Bundle</a>
    </div>
    <p id="save-status" class="text-sm text-slate-400"></p>
  </div>

  <!-- Pairing -->
  <div id="pairing" class="hidden bg-slate-900 border border-emerald-800 rounded-xl p-6 space-y-4">
    <div class="flex items-center">
      <h2 class="text-lg font-semibold">Connect WhatsApp</h2>
      <button class="ml-auto text-sm px-3 py-1.5 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="pairingAction('close')">Close</button>
    </div>
    <div id="pair-choice" class="hidden flex gap-3">
      <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500" onclick="pairingAction('production')">Deployed runner</button>
      <button class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="pairingAction('simulator')">Simulator</button>
    </div>
    <div id="pair-production" class="hidden space-y-3">
      <p id="pair-status" class="text-sm"></p>
      <p id="pair-notice" class="text-sm text-yellow-400"></p>
      <img id="pair-qr" class="hidden bg-white p-2 rounded-lg w-64 h-64">
      <div id="pair-existing" class="hidden flex gap-3">
        <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500" onclick="pairingAction('adopt')">Use existing session</button>
        <button class="px-4 py-2 rounded-lg bg-red-700 hover:bg-red-600" onclick="pairingAction('reset')">Reset and show new QR</button>
      </div>
      <button class="text-sm px-3 py-1.5 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="pairingAction('back')">Back</button>
      <div id="logs" class="bg-black rounded-lg p-3 font-mono text-xs text-emerald-400 max-h-48 overflow-y-auto"></div>
    </div>
    <div id="pair-simulator" class="hidden">
      <div class="w-full bg-slate-800 rounded-full h-3"><div id="pair-progress" class="bg-emerald-500 h-3 rounded-full" style="width:0%"></div></div>
    </div>
  </div>

  <!-- Chat -->
  <div id="chat" class="hidden bg-slate-900 border border-slate-800 rounded-xl p-6 space-y-3">
    <h2 class="text-lg font-semibold">Chat simulator</h2>
    <p id="chat-hint" class="text-sm text-yellow-400 hidden">This bot is offline or paused and will not reply.</p>
    <div id="transcript" class="bg-slate-950 rounded-lg p-3 h-64 overflow-y-auto space-y-2 text-sm"></div>
    <form onsubmit="sendChat(event)" class="flex gap-2">
      <input id="chat-text" class="flex-1 bg-slate-800 border border-slate-700 rounded-lg px-3 py-2" placeholder="Type a message">
      <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500">Send</button>
    </form>
  </div>

  <!-- Store -->
  <div id="store" class="hidden bg-slate-900 border border-slate-800 rounded-xl p-6 space-y-3">
    <h2 class="text-lg font-semibold">Cloud store</h2>
    <input id="store-url" placeholder="https://project.supabase.co" class="w-full bg-slate-800 border border-slate-700 rounded-lg px-3 py-2">
    <input id="store-key" type="password" placeholder="Access key" class="w-full bg-slate-800 border border-slate-700 rounded-lg px-3 py-2">
    <div class="flex gap-2">
      <button class="px-4 py-2 rounded-lg bg-emerald-600 hover:bg-emerald-500" onclick="saveStore()">Save</button>
      <button class="px-4 py-2 rounded-lg bg-slate-800 hover:bg-slate-700" onclick="resetStore()">Restore defaults</button>
    </div>
    <p id="store-status" class="text-sm text-slate-400"></p>
  </div>
</div>

</main>

<script>
let state = null;
let events = null;

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' })[c]);
}

async function api(method, path, body) {
  const res = await fetch(path, {
    method,
    headers: body ? { 'Content-Type': 'application/json' } : {},
    body: body ? JSON.stringify(body) : undefined,
  });
  const data = res.status === 204 ? null : await res.json();
  if (!res.ok) throw new Error(data && data.error ? data.error : res.statusText);
  return data;
}

function show(id, on) { document.getElementById(id).classList.toggle('hidden', !on); }

function badgeClass(acc) {
  if (acc.status === 'connected') return acc.isActive ? 'text-emerald-400' : 'text-yellow-400';
  return 'text-slate-500';
}

function badgeText(acc) {
  if (acc.status === 'connected') return acc.isActive ? 'CONNECTED' : 'PAUSED';
  return 'OFFLINE';
}

function render() {
  const logged = !!state;
  show('login-card', !logged);
  show('dashboard', logged);
  show('logout-btn', logged);
  show('store-btn', logged);
  if (!logged) return;

  document.getElementById('user-label').textContent = state.user.username;
  document.getElementById('counts').textContent =
    `${state.accounts.length} / ${state.maxAccounts}, ${state.connectedCount} connected` +
    (state.pendingWrites ? `, ${state.pendingWrites} pending` : '');
  show('sync-banner', !!state.syncError);
  document.getElementById('sync-text').textContent = state.syncError || '';
  show('create-form', state.accounts.length < state.maxAccounts);

  document.getElementById('accounts').innerHTML = state.accounts.map(a => `
    <div class="bg-slate-800 rounded-lg p-4 cursor-pointer border ${a.id === state.selectedId ? 'border-emerald-500' : 'border-transparent'}" onclick="selectAccount('${esc(a.id)}')">
      <div class="flex items-center gap-3">
        <div class="${esc(a.avatarColor)} w-9 h-9 rounded-full flex items-center justify-center font-bold">${esc((a.name || '?')[0].toUpperCase())}</div>
        <div class="flex-1">
          <div class="font-semibold">${esc(a.name)}</div>
          <div class="text-xs text-slate-400">${esc(a.phoneNumber)}</div>
        </div>
        <span class="text-xs font-bold ${badgeClass(a)}">${badgeText(a)}</span>
        <button class="text-xs text-red-400 hover:text-red-300" onclick="event.stopPropagation(); deleteAccount('${esc(a.id)}')">Delete</button>
      </div>
    </div>`).join('');

  show('editor', !!state.selectedId);
  show('chat', !!state.selectedId);
  if (state.selectedId) loadEditor();
}

async function refresh() {
  try { state = await api('GET', '/api/session'); } catch (e) { state = null; }
  render();
}

async function login(e) {
  e.preventDefault();
  try {
    state = await api('POST', '/api/login', { token: document.getElementById('token').value });
    show('login-error', false);
    render();
  } catch (err) {
    const el = document.getElementById('login-error');
    el.textContent = err.message;
    show('login-error', true);
  }
}

async function logout() {
  await api('POST', '/api/logout');
  state = null;
  render();
}

async function retrySync() { state = await api('POST', '/api/sync'); render(); }
async function dismissSync() { state = await api('POST', '/api/sync/dismiss'); render(); }

async function createAccount(e) {
  e.preventDefault();
  try {
    await api('POST', '/api/accounts', {
      name: document.getElementById('new-name').value,
      phoneNumber: document.getElementById('new-phone').value,
    });
    document.getElementById('new-name').value = '';
    document.getElementById('new-phone').value = '';
    show('create-error', false);
    await refresh();
  } catch (err) {
    const el = document.getElementById('create-error');
    el.textContent = err.message;
    show('create-error', true);
  }
}

async function deleteAccount(id) {
  if (!confirm('Delete this account? This cannot be undone.')) return;
  state = await api('DELETE', `/api/accounts/${id}`);
  render();
}

async function selectAccount(id) {
  state = await api('POST', `/api/accounts/${id}/select`);
  render();
  loadChat();
}

async function loadEditor() {
  const id = state.selectedId;
  const cfg = await api('GET', `/api/accounts/${id}/config`);
  const acc = state.accounts.find(a => a.id === id);
  document.getElementById('editor-name').textContent = acc ? acc.name : '';
  document.getElementById('instruction').value = cfg.systemInstruction;
  document.getElementById('temperature').value = cfg.temperature;
  document.getElementById('temp-label').textContent = cfg.temperature.toFixed(1);
  document.getElementById('active').checked = cfg.isActive;
  document.getElementById('runner-url').value = cfg.runnerUrl || '';
  for (const [el, file] of [['dl-server', 'server.js'], ['dl-package', 'package.json'], ['dl-guide', 'guide'], ['dl-bundle', 'bundle.tar.gz']]) {
    document.getElementById(el).href = `/api/accounts/${id}/${file}`;
  }
}

async function saveConfig(resetInstruction) {
  const status = document.getElementById('save-status');
  try {
    const res = await api('PUT', `/api/accounts/${state.selectedId}/config`, {
      systemInstruction: document.getElementById('instruction').value,
      temperature: parseFloat(document.getElementById('temperature').value),
      isActive: document.getElementById('active').checked,
      runnerUrl: document.getElementById('runner-url').value,
      resetInstruction,
    });
    const o = res.outcome;
    if (!o) status.textContent = 'No changes.';
    else if (o.kind === 'local_only') status.textContent = 'Saved. No runner URL set, so the deployed bot was not updated.';
    else if (o.kind === 'remote') status.textContent = 'Saved and pushed to the runner.';
    else status.textContent = `Saved locally, but the runner update failed: ${o.error}`;
    await refresh();
  } catch (err) {
    status.textContent = err.message;
  }
}

async function disconnect() {
  const res = await api('POST', `/api/accounts/${state.selectedId}/disconnect`);
  if (res.remoteNotice) alert(res.remoteNotice);
  await refresh();
}

function renderPairing(s) {
  show('pairing', s.step !== 'none');
  show('pair-choice', s.step === 'choice');
  show('pair-production', s.step === 'production');
  show('pair-simulator', s.step === 'simulator');
  document.getElementById('pair-status').textContent = s.isResetting ? 'Resetting the runner...' : `Runner status: ${s.status}`;
  document.getElementById('pair-notice').textContent = s.notice || '';
  const qr = document.getElementById('pair-qr');
  if (s.qr) { qr.src = s.qr; show('pair-qr', true); } else { show('pair-qr', false); }
  show('pair-existing', !s.isResetting && s.status === 'CONNECTED');
  document.getElementById('logs').innerHTML = (s.logs || []).map(esc).join('<br>');
  document.getElementById('pair-progress').style.width = `${s.progress}%`;
  if (s.step === 'none' && events) { events.close(); events = null; refresh(); }
}

async function openPairing() {
  const snap = await api('POST', '/api/pairing/open', { accountId: state.selectedId });
  renderPairing(snap);
  if (events) events.close();
  events = new EventSource('/api/pairing/events');
  events.onmessage = (ev) => renderPairing(JSON.parse(ev.data));
}

async function pairingAction(action) {
  try {
    const res = await api('POST', `/api/pairing/${action}`);
    if (action === 'adopt') { await refresh(); return; }
    renderPairing(res);
  } catch (err) {
    document.getElementById('pair-notice').textContent = err.message;
  }
}

async function loadChat() {
  const view = await api('GET', '/api/chat');
  renderChat(view);
}

function renderChat(view) {
  show('chat-hint', !view.willReply);
  document.getElementById('transcript').innerHTML = view.transcript.map(m => `
    <div class="${m.sender === 'user' ? 'text-right' : ''}">
      <span class="inline-block px-3 py-2 rounded-lg ${m.sender === 'user' ? 'bg-emerald-800' : 'bg-slate-800'}">${esc(m.text)}</span>
    </div>`).join('');
}

async function sendChat(e) {
  e.preventDefault();
  const input = document.getElementById('chat-text');
  const text = input.value;
  input.value = '';
  renderChat(await api('POST', '/api/chat', { accountId: state.selectedId, text }));
}

async function openStore() {
  const cfg = await api('GET', '/api/store');
  document.getElementById('store-url').value = cfg.url;
  document.getElementById('store-status').textContent = cfg.isOverride ? 'Using a saved override.' : 'Using the configured defaults.';
  show('store', true);
}

async function saveStore() {
  try {
    await api('PUT', '/api/store', {
      url: document.getElementById('store-url').value,
      key: document.getElementById('store-key').value,
    });
    await openStore();
    await refresh();
  } catch (err) {
    document.getElementById('store-status').textContent = err.message;
  }
}

async function resetStore() {
  await api('DELETE', '/api/store');
  await openStore();
  await refresh();
}

refresh();
</script>
</body>
</html>
"##;
