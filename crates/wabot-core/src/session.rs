use crate::auth::AuthGate;
use crate::config::Settings;
use crate::editor::{ConfigEditor, SaveOutcome};
use crate::error::AppError;
use crate::interfaces::{AccountStore, ChatBackend, Preferences, RunnerApi};
use crate::pairing::{self, DisconnectOutcome, PairingFlow};
use crate::prefs;
use crate::registry::{AccountRegistry, SharedRegistry};
use crate::simulator::ChatSimulator;
use crate::types::{BotAccount, SessionUser};
use std::sync::Arc;
use tracing::{info, warn};

/// Explicitly constructed collaborators, injected into every session.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn AccountStore>,
    pub runner: Arc<dyn RunnerApi>,
    pub chat: Arc<dyn ChatBackend>,
    pub prefs: Arc<dyn Preferences>,
}

/// Everything that exists between login and logout. Clones share the
/// same registry.
#[derive(Clone)]
pub struct Session {
    user: SessionUser,
    registry: SharedRegistry,
    services: Services,
}

impl Session {
    /// Check the secret, persist the user and load the accounts.
    ///
    /// A failed load does not fail the login; the registry keeps the error
    /// for the sync banner.
    pub async fn login(
        services: Services,
        gate: &AuthGate,
        settings: &Settings,
        token: &str,
    ) -> Result<Self, AppError> {
        let user = gate.login(services.prefs.as_ref(), token)?;
        Ok(Self::start(services, settings, user).await)
    }

    /// Restore the persisted session user, if there is one.
    pub async fn resume(
        services: Services,
        gate: &AuthGate,
        settings: &Settings,
    ) -> Result<Option<Self>, AppError> {
        match gate.current_user(services.prefs.as_ref())? {
            Some(user) => Ok(Some(Self::start(services, settings, user).await)),
            None => Ok(None),
        }
    }

    async fn start(services: Services, settings: &Settings, user: SessionUser) -> Self {
        let mut registry = AccountRegistry::new(services.store.clone(), settings.store_token())
            .with_outbox(services.prefs.clone());
        if let Err(e) = registry.load().await {
            warn!(error = %e, "starting session with an empty account list");
        }
        info!(user = %user.username, accounts = registry.len(), "session ready");
        Self {
            user,
            registry: registry.into_shared(),
            services,
        }
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn runner_url(&self, account_id: &str) -> Result<Option<String>, AppError> {
        prefs::runner_url(self.services.prefs.as_ref(), account_id)
    }

    pub fn set_runner_url(&self, account_id: &str, url: &str) -> Result<(), AppError> {
        prefs::set_runner_url(self.services.prefs.as_ref(), account_id, url)
    }

    pub async fn create_account(&self, name: &str, phone_number: &str) -> Result<BotAccount, AppError> {
        self.registry
            .lock()
            .await
            .create(&self.user, name, phone_number)
            .await
    }

    /// Delete the account and forget its runner URL.
    pub async fn delete_account(&self, account_id: &str) -> Result<BotAccount, AppError> {
        let removed = self.registry.lock().await.delete(account_id).await?;
        prefs::clear_runner_url(self.services.prefs.as_ref(), account_id)?;
        Ok(removed)
    }

    pub async fn save_config(&self, editor: &mut ConfigEditor) -> Result<SaveOutcome, AppError> {
        editor.save(&self.registry, self.services.runner.as_ref()).await
    }

    pub async fn editor(&self, account_id: &str) -> Result<ConfigEditor, AppError> {
        let registry = self.registry.lock().await;
        let account = registry.require(account_id)?;
        Ok(ConfigEditor::open(account, self.runner_url(account_id)?))
    }

    pub fn pairing(&self) -> PairingFlow {
        PairingFlow::new(self.services.runner.clone(), self.registry.clone())
    }

    pub fn chat(&self) -> ChatSimulator {
        ChatSimulator::new(self.services.chat.clone())
    }

    pub async fn disconnect(&self, account_id: &str) -> Result<DisconnectOutcome, AppError> {
        let url = self.runner_url(account_id)?;
        pairing::disconnect(
            &self.registry,
            self.services.runner.as_ref(),
            url.as_deref(),
            account_id,
        )
        .await
    }

    /// Clear the persisted user and drop the registry.
    pub fn logout(self, gate: &AuthGate) -> Result<(), AppError> {
        gate.logout(self.services.prefs.as_ref())
    }
}
