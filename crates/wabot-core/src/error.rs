use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Account limit reached ({0} accounts max)")]
    AccountLimit(usize),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("No accounts yet: create one from the dashboard first")]
    NoAccounts,

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid store configuration: {0}")]
    InvalidStoreConfig(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Runner error: {0}")]
    Runner(String),

    #[error("No runner URL set for account {0}")]
    MissingRunnerUrl(String),

    #[error("Chat service error: {0}")]
    Chat(String),

    #[error("Nothing to save")]
    NothingToSave,

    #[error("Pairing flow: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
