use crate::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "WhatsApp Manager Pro";
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";
pub const ADMIN_USER_ID: &str = "admin_master_id";

/// Hard cap on accounts a single console manages.
pub const MAX_ACCOUNTS: usize = 10;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_INSTRUCTION: &str = "You are a professional virtual assistant.
Your job is to answer customers with clear and accurate information.
Be polite and professional, and use emoji occasionally.
If you do not know the answer, ask the customer to wait for a human operator.";

pub const AVATAR_COLORS: [&str; 5] = [
    "bg-blue-600",
    "bg-purple-600",
    "bg-emerald-600",
    "bg-orange-600",
    "bg-pink-600",
];

pub const STORE_TABLE: &str = "bot_nodes";

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CHAT_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const POLL_BACKOFF_MAX: Duration = Duration::from_secs(30);
pub const RESET_COOLDOWN: Duration = Duration::from_secs(4);
pub const SIMULATOR_TICK: Duration = Duration::from_millis(200);
pub const SIMULATOR_STEP: u8 = 5;
pub const SIMULATOR_CLOSE_DELAY: Duration = Duration::from_millis(800);

// Local preference keys.
pub const SESSION_KEY: &str = "session_user";
pub const STORE_CONFIG_KEY: &str = "store_config";
pub const RUNNER_URL_PREFIX: &str = "server_url_";
pub const SELECTED_ACCOUNT_KEY: &str = "selected_account";
pub const OUTBOX_KEY: &str = "pending_writes";

/// Resolve the app data directory: ~/.wabot/
pub fn app_dir() -> Result<PathBuf, AppError> {
    let home = dirs::home_dir().ok_or(AppError::HomeDirNotFound)?;
    Ok(home.join(".wabot"))
}

/// ~/.wabot/console.db
pub fn prefs_path() -> Result<PathBuf, AppError> {
    Ok(app_dir()?.join("console.db"))
}

/// ~/.wabot/exports/
pub fn exports_dir() -> Result<PathBuf, AppError> {
    Ok(app_dir()?.join("exports"))
}

/// Ensure all app directories exist
pub fn ensure_dirs() -> Result<(), AppError> {
    std::fs::create_dir_all(exports_dir()?)?;
    Ok(())
}

/// Runtime settings. Every secret arrives through flags or the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub master_token: String,
    pub admin_name: String,
    pub store_url: String,
    pub store_key: String,
    pub chat_api_key: String,
    pub chat_model: String,
    pub chat_api_base: String,
}

impl Settings {
    pub fn new(master_token: impl Into<String>) -> Self {
        Self {
            master_token: master_token.into(),
            admin_name: DEFAULT_ADMIN_NAME.to_string(),
            store_url: String::new(),
            store_key: String::new(),
            chat_api_key: String::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_api_base: DEFAULT_CHAT_API_BASE.to_string(),
        }
    }

    /// Token every store row is scoped by.
    pub fn store_token(&self) -> &str {
        &self.master_token
    }
}
