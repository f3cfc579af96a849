use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::warn;
use wabot_cloud::{GeminiClient, HttpRunner, SupabaseStore, UnconfiguredChat};
use wabot_core::auth::AuthGate;
use wabot_core::config::{self, Settings, DEFAULT_ADMIN_NAME, DEFAULT_CHAT_API_BASE, DEFAULT_CHAT_MODEL};
use wabot_core::interfaces::{AccountStore, ChatBackend, Preferences, RunnerApi};
use wabot_core::memory::MemoryStore;
use wabot_core::prefs;
use wabot_core::session::{Services, Session};
use wabot_core::types::{BotAccount, StoreConfig};
use wabot_core::AppError;
use wabot_db::LocalStore;

/// Secrets and endpoints. Flags win over the environment (and `.env`).
#[derive(Args)]
pub struct GlobalArgs {
    /// Master access token for the console
    #[arg(long, env = "WABOT_MASTER_TOKEN", default_value = "", hide_env_values = true, global = true)]
    master_token: String,

    /// Display name of the administrator
    #[arg(long, env = "WABOT_ADMIN_NAME", default_value = DEFAULT_ADMIN_NAME, global = true)]
    admin_name: String,

    /// Cloud store project URL (e.g. https://xyz.supabase.co)
    #[arg(long, env = "WABOT_STORE_URL", default_value = "", global = true)]
    store_url: String,

    /// Cloud store access key
    #[arg(long, env = "WABOT_STORE_KEY", default_value = "", hide_env_values = true, global = true)]
    store_key: String,

    /// Gemini API key for the chat simulator
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true, global = true)]
    gemini_key: String,

    /// Chat model used by the simulator
    #[arg(long, env = "WABOT_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL, global = true)]
    chat_model: String,

    /// Base URL of the generative-AI API
    #[arg(long, env = "WABOT_CHAT_API_BASE", default_value = DEFAULT_CHAT_API_BASE, global = true, hide = true)]
    chat_api_base: String,
}

impl GlobalArgs {
    fn into_settings(self) -> Settings {
        Settings {
            admin_name: self.admin_name,
            store_url: self.store_url,
            store_key: self.store_key,
            chat_api_key: self.gemini_key,
            chat_model: self.chat_model,
            chat_api_base: self.chat_api_base,
            ..Settings::new(self.master_token)
        }
    }
}

/// Process-wide wiring: settings, the auth gate and the local preferences.
pub struct App {
    pub settings: Settings,
    pub gate: AuthGate,
    pub prefs: Arc<LocalStore>,
}

impl App {
    pub fn new(args: GlobalArgs) -> Result<Self> {
        let settings = args.into_settings();
        config::ensure_dirs()?;
        let prefs = LocalStore::open_default().context("Failed to open local preferences")?;
        Ok(Self {
            gate: AuthGate::new(settings.master_token.clone(), settings.admin_name.clone()),
            settings,
            prefs: Arc::new(prefs),
        })
    }

    pub fn prefs(&self) -> Arc<dyn Preferences> {
        self.prefs.clone()
    }

    pub fn runner(&self) -> Result<Arc<dyn RunnerApi>> {
        Ok(Arc::new(HttpRunner::new()?))
    }

    pub fn chat(&self) -> Result<Arc<dyn ChatBackend>> {
        let key = self.settings.chat_api_key.trim();
        if key.is_empty() {
            return Ok(Arc::new(UnconfiguredChat));
        }
        let client = GeminiClient::new(key)?
            .with_model(self.settings.chat_model.clone())
            .with_api_base(self.settings.chat_api_base.clone());
        Ok(Arc::new(client))
    }

    pub fn store_config(&self) -> Result<StoreConfig> {
        Ok(prefs::store_config(self.prefs.as_ref(), &self.settings)?)
    }

    pub fn services(&self) -> Result<Services> {
        Ok(Services {
            store: build_store(&self.store_config()?)?,
            runner: self.runner()?,
            chat: self.chat()?,
            prefs: self.prefs(),
        })
    }

    /// The persisted session, or an error telling the user to log in.
    pub async fn session(&self) -> Result<Session> {
        let session = Session::resume(self.services()?, &self.gate, &self.settings)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{}. Run `wabot login` first.", AppError::NotLoggedIn))?;
        if let Some(id) = prefs::selected_account(self.prefs.as_ref())? {
            // The account may have been deleted from another console.
            let _ = session.registry().lock().await.select(&id);
        }
        Ok(session)
    }

    /// Remember `id` as the default account for later commands.
    pub fn remember_selection(&self, id: Option<&str>) -> Result<()> {
        Ok(prefs::set_selected_account(self.prefs.as_ref(), id)?)
    }

    /// Resolve an optional id argument to an account, falling back to the
    /// selected account and then the first one.
    pub async fn account(&self, session: &Session, id: Option<String>) -> Result<BotAccount> {
        let account = {
            let registry = session.registry();
            let mut reg = registry.lock().await;
            match id {
                Some(id) => reg.select(&id)?.clone(),
                None => reg.ensure_selection()?.clone(),
            }
        };
        self.remember_selection(Some(&account.id))?;
        Ok(account)
    }
}

/// Hosted store when configured, otherwise an in-memory one for this run.
pub fn build_store(cfg: &StoreConfig) -> Result<Arc<dyn AccountStore>, AppError> {
    if cfg.url.trim().is_empty() && cfg.key.trim().is_empty() {
        warn!("no cloud store configured; accounts are kept in memory for this run only");
        return Ok(Arc::new(MemoryStore::default()));
    }
    Ok(Arc::new(SupabaseStore::new(cfg)?))
}

/// Print the sync banner, if any, after a command touched the registry.
pub async fn report_sync(session: &Session) {
    let registry = session.registry();
    let reg = registry.lock().await;
    if let Some(err) = reg.sync_error() {
        eprintln!("{}", console::style(format!("Warning: {err}")).yellow());
    }
    let pending = reg.pending_writes().len();
    if pending > 0 {
        eprintln!(
            "{}",
            console::style(format!(
                "{pending} change(s) could not be saved to the cloud store. Run `wabot sync` to retry."
            ))
            .yellow()
        );
    }
}
