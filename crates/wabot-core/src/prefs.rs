use crate::config::{
    Settings, OUTBOX_KEY, RUNNER_URL_PREFIX, SELECTED_ACCOUNT_KEY, SESSION_KEY, STORE_CONFIG_KEY,
};
use crate::error::AppError;
use crate::interfaces::Preferences;
use crate::registry::PendingWrite;
use crate::types::{SessionUser, StoreConfig};
use tracing::warn;

pub fn load_session(prefs: &dyn Preferences) -> Result<Option<SessionUser>, AppError> {
    match prefs.get(SESSION_KEY)? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable session");
                prefs.remove(SESSION_KEY)?;
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

pub fn save_session(prefs: &dyn Preferences, user: &SessionUser) -> Result<(), AppError> {
    prefs.set(SESSION_KEY, &serde_json::to_string(user)?)
}

pub fn clear_session(prefs: &dyn Preferences) -> Result<(), AppError> {
    prefs.remove(SESSION_KEY)
}

fn runner_key(account_id: &str) -> String {
    format!("{RUNNER_URL_PREFIX}{account_id}")
}

/// Runner URL associated with an account, if any.
pub fn runner_url(prefs: &dyn Preferences, account_id: &str) -> Result<Option<String>, AppError> {
    Ok(prefs
        .get(&runner_key(account_id))?
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty()))
}

/// Associate a runner URL with an account. A blank URL removes the association.
pub fn set_runner_url(prefs: &dyn Preferences, account_id: &str, url: &str) -> Result<(), AppError> {
    let url = url.trim();
    if url.is_empty() {
        prefs.remove(&runner_key(account_id))
    } else {
        prefs.set(&runner_key(account_id), url)
    }
}

pub fn clear_runner_url(prefs: &dyn Preferences, account_id: &str) -> Result<(), AppError> {
    prefs.remove(&runner_key(account_id))
}

/// Account the terminal commands default to.
pub fn selected_account(prefs: &dyn Preferences) -> Result<Option<String>, AppError> {
    prefs.get(SELECTED_ACCOUNT_KEY)
}

pub fn set_selected_account(prefs: &dyn Preferences, account_id: Option<&str>) -> Result<(), AppError> {
    match account_id {
        Some(id) => prefs.set(SELECTED_ACCOUNT_KEY, id),
        None => prefs.remove(SELECTED_ACCOUNT_KEY),
    }
}

/// Store writes still waiting for a retry, oldest first.
pub fn pending_writes(prefs: &dyn Preferences) -> Result<Vec<PendingWrite>, AppError> {
    let Some(raw) = prefs.get(OUTBOX_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(writes) => Ok(writes),
        Err(e) => {
            warn!(error = %e, "discarding unreadable outbox");
            prefs.remove(OUTBOX_KEY)?;
            Ok(Vec::new())
        }
    }
}

pub fn save_pending_writes(prefs: &dyn Preferences, writes: &[PendingWrite]) -> Result<(), AppError> {
    if writes.is_empty() {
        prefs.remove(OUTBOX_KEY)
    } else {
        prefs.set(OUTBOX_KEY, &serde_json::to_string(writes)?)
    }
}

/// Saved override first, then the configured defaults.
pub fn store_config(prefs: &dyn Preferences, settings: &Settings) -> Result<StoreConfig, AppError> {
    if let Some(raw) = prefs.get(STORE_CONFIG_KEY)? {
        match serde_json::from_str::<StoreConfig>(&raw) {
            Ok(cfg) if !cfg.url.is_empty() && !cfg.key.is_empty() => return Ok(cfg),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable store override"),
        }
    }
    Ok(StoreConfig {
        url: settings.store_url.clone(),
        key: settings.store_key.clone(),
    })
}

pub fn validate_store_config(cfg: &StoreConfig) -> Result<(), AppError> {
    if cfg.key.trim().is_empty() {
        return Err(AppError::InvalidStoreConfig("access key is empty".into()));
    }
    let url = reqwest::Url::parse(cfg.url.trim())
        .map_err(|e| AppError::InvalidStoreConfig(format!("bad project URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidStoreConfig(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

pub fn save_store_config(prefs: &dyn Preferences, cfg: &StoreConfig) -> Result<(), AppError> {
    validate_store_config(cfg)?;
    let cfg = StoreConfig {
        url: cfg.url.trim().trim_end_matches('/').to_string(),
        key: cfg.key.trim().to_string(),
    };
    prefs.set(STORE_CONFIG_KEY, &serde_json::to_string(&cfg)?)
}

/// Drop the override and fall back to the configured defaults.
pub fn reset_store_config(prefs: &dyn Preferences, settings: &Settings) -> Result<StoreConfig, AppError> {
    prefs.remove(STORE_CONFIG_KEY)?;
    store_config(prefs, settings)
}
