use crate::config::ADMIN_USER_ID;
use crate::error::AppError;
use crate::interfaces::Preferences;
use crate::prefs;
use crate::types::{Role, SessionUser};
use tracing::{info, warn};

/// Shared-secret login. There is one role and no lockout.
pub struct AuthGate {
    master_token: String,
    admin_name: String,
}

impl AuthGate {
    pub fn new(master_token: impl Into<String>, admin_name: impl Into<String>) -> Self {
        Self {
            master_token: master_token.into(),
            admin_name: admin_name.into(),
        }
    }

    /// Check `token` and persist the resulting session user.
    pub fn login(&self, prefs: &dyn Preferences, token: &str) -> Result<SessionUser, AppError> {
        let token = token.trim();
        if self.master_token.is_empty() || token != self.master_token {
            warn!("rejected login attempt");
            return Err(AppError::InvalidToken);
        }

        let user = SessionUser {
            id: ADMIN_USER_ID.to_string(),
            username: self.admin_name.clone(),
            role: Role::Admin,
        };
        prefs::save_session(prefs, &user)?;
        info!(user = %user.username, "session started");
        Ok(user)
    }

    pub fn current_user(&self, prefs: &dyn Preferences) -> Result<Option<SessionUser>, AppError> {
        prefs::load_session(prefs)
    }

    pub fn logout(&self, prefs: &dyn Preferences) -> Result<(), AppError> {
        prefs::clear_session(prefs)?;
        info!("session cleared");
        Ok(())
    }
}
