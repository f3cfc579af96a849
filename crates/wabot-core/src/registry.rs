use crate::config::{DEFAULT_INSTRUCTION, DEFAULT_TEMPERATURE, MAX_ACCOUNTS};
use crate::error::AppError;
use crate::ids;
use crate::interfaces::{AccountStore, Preferences};
use crate::prefs;
use crate::types::{BotAccount, BotConfig, ConnectionStatus, ServerStatus, SessionUser};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type SharedRegistry = Arc<tokio::sync::Mutex<AccountRegistry>>;

/// A remote write that failed and is waiting for [`AccountRegistry::flush_pending`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "target", rename_all = "snake_case")]
pub enum PendingWrite {
    Upsert(BotAccount),
    Delete(String),
}

impl PendingWrite {
    fn account_id(&self) -> &str {
        match self {
            Self::Upsert(acc) => &acc.id,
            Self::Delete(id) => id,
        }
    }
}

/// In-memory list of accounts, mutated optimistically and echoed to the store.
///
/// Local state is what the console shows. A failed remote write is never
/// rolled back; it is kept in the outbox and re-applied over fresh loads
/// until a flush gets it through. With [`AccountRegistry::with_outbox`] the
/// outbox outlives the registry, so a later process can flush it.
pub struct AccountRegistry {
    store: Arc<dyn AccountStore>,
    user_token: String,
    max_accounts: usize,
    accounts: Vec<BotAccount>,
    selected: Option<String>,
    sync_error: Option<String>,
    pending: Vec<PendingWrite>,
    outbox: Option<Arc<dyn Preferences>>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn AccountStore>, user_token: impl Into<String>) -> Self {
        Self {
            store,
            user_token: user_token.into(),
            max_accounts: MAX_ACCOUNTS,
            accounts: Vec::new(),
            selected: None,
            sync_error: None,
            pending: Vec::new(),
            outbox: None,
        }
    }

    /// Keep the outbox in `prefs` and pick up writes queued by earlier runs.
    pub fn with_outbox(mut self, outbox: Arc<dyn Preferences>) -> Self {
        match prefs::pending_writes(outbox.as_ref()) {
            Ok(writes) => {
                if !writes.is_empty() {
                    info!(count = writes.len(), "queued store writes restored");
                }
                self.pending = writes;
            }
            Err(e) => warn!(error = %e, "could not read the outbox"),
        }
        self.outbox = Some(outbox);
        self
    }

    pub fn with_max_accounts(mut self, max: usize) -> Self {
        self.max_accounts = max;
        self
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn accounts(&self) -> &[BotAccount] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn max_accounts(&self) -> usize {
        self.max_accounts
    }

    pub fn can_create(&self) -> bool {
        self.accounts.len() < self.max_accounts
    }

    pub fn connected_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.is_connected()).count()
    }

    pub fn get(&self, id: &str) -> Option<&BotAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&BotAccount, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::UnknownAccount(id.to_string()))
    }

    pub fn selected(&self) -> Option<&BotAccount> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn select(&mut self, id: &str) -> Result<&BotAccount, AppError> {
        if self.get(id).is_none() {
            return Err(AppError::UnknownAccount(id.to_string()));
        }
        self.selected = Some(id.to_string());
        self.require(id)
    }

    /// The selected account, falling back to the first one.
    pub fn ensure_selection(&mut self) -> Result<&BotAccount, AppError> {
        if self.selected().is_none() {
            let first = self.accounts.first().ok_or(AppError::NoAccounts)?;
            self.selected = Some(first.id.clone());
        }
        self.selected().ok_or(AppError::NoAccounts)
    }

    /// Last store failure, shown as a dismissible banner.
    pub fn sync_error(&self) -> Option<&str> {
        self.sync_error.as_deref()
    }

    pub fn dismiss_sync_error(&mut self) {
        self.sync_error = None;
    }

    pub fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending
    }

    /// Replace the list with the store's rows.
    ///
    /// On failure the last good list stays in place and the error is kept
    /// for the banner; calling `load` again is the retry.
    pub async fn load(&mut self) -> Result<usize, AppError> {
        match self.store.load_accounts(&self.user_token).await {
            Ok(mut accounts) => {
                for write in &self.pending {
                    match write {
                        PendingWrite::Upsert(acc) => {
                            match accounts.iter_mut().find(|a| a.id == acc.id) {
                                Some(slot) => *slot = acc.clone(),
                                None => accounts.push(acc.clone()),
                            }
                        }
                        PendingWrite::Delete(id) => accounts.retain(|a| &a.id != id),
                    }
                }
                accounts.sort_by(|a, b| a.id.cmp(&b.id));
                self.accounts = accounts;
                self.sync_error = None;
                if self.selected().is_none() {
                    self.selected = None;
                }
                info!(count = self.accounts.len(), "accounts loaded");
                Ok(self.accounts.len())
            }
            Err(e) => {
                warn!(error = %e, "account load failed; keeping previous list");
                self.sync_error = Some(format!("Cloud sync failed: {e}"));
                Err(e)
            }
        }
    }

    /// Build a new account for `user`, append and select it, then persist.
    pub async fn create(
        &mut self,
        user: &SessionUser,
        name: &str,
        phone_number: &str,
    ) -> Result<BotAccount, AppError> {
        let name = name.trim();
        let phone_number = phone_number.trim();
        if name.is_empty() {
            return Err(AppError::MissingParam("name".into()));
        }
        if phone_number.is_empty() {
            return Err(AppError::MissingParam("phone number".into()));
        }
        if !self.can_create() {
            return Err(AppError::AccountLimit(self.max_accounts));
        }

        let account = BotAccount {
            id: ids::account_id(&self.accounts),
            instance_id: ids::instance_id(),
            user_id: user.id.clone(),
            phone_number: phone_number.to_string(),
            name: name.to_string(),
            is_active: true,
            status: ConnectionStatus::Disconnected,
            config: BotConfig {
                system_instruction: DEFAULT_INSTRUCTION.to_string(),
                temperature: DEFAULT_TEMPERATURE,
            },
            avatar_color: ids::avatar_color(self.accounts.len()).to_string(),
            last_active: None,
            server_status: ServerStatus::Offline,
            messages_count: 0,
        };

        self.accounts.push(account.clone());
        self.selected = Some(account.id.clone());
        info!(id = %account.id, instance = %account.instance_id, "account created");

        self.persist(PendingWrite::Upsert(account.clone())).await;
        Ok(account)
    }

    /// Replace the account with the same id, then persist.
    pub async fn update(&mut self, account: BotAccount) -> Result<(), AppError> {
        let slot = self
            .accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| AppError::UnknownAccount(account.id.clone()))?;
        *slot = account.clone();
        debug!(id = %account.id, "account updated");

        self.persist(PendingWrite::Upsert(account)).await;
        Ok(())
    }

    /// Mark the account paired with a live session.
    pub async fn mark_connected(&mut self, id: &str) -> Result<BotAccount, AppError> {
        let mut account = self.require(id)?.clone();
        account.status = ConnectionStatus::Connected;
        account.server_status = ServerStatus::Online;
        account.last_active = Some(Utc::now());
        self.update(account.clone()).await?;
        Ok(account)
    }

    /// Local half of a disconnect: offline and paused.
    pub async fn mark_disconnected(&mut self, id: &str) -> Result<BotAccount, AppError> {
        let mut account = self.require(id)?.clone();
        account.status = ConnectionStatus::Disconnected;
        account.server_status = ServerStatus::Offline;
        account.is_active = false;
        self.update(account.clone()).await?;
        Ok(account)
    }

    /// Remove the account locally and from the store. There is no undo.
    pub async fn delete(&mut self, id: &str) -> Result<BotAccount, AppError> {
        let pos = self
            .accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| AppError::UnknownAccount(id.to_string()))?;
        let removed = self.accounts.remove(pos);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        info!(id, "account deleted");

        self.persist(PendingWrite::Delete(id.to_string())).await;
        Ok(removed)
    }

    /// Retry queued writes in order. Returns how many went through.
    pub async fn flush_pending(&mut self) -> usize {
        let queued = std::mem::take(&mut self.pending);
        let mut flushed = 0;
        for write in queued {
            match self.send(&write).await {
                Ok(()) => flushed += 1,
                Err(e) => {
                    warn!(id = write.account_id(), error = %e, "pending write still failing");
                    self.pending.push(write);
                }
            }
        }
        if self.pending.is_empty() {
            self.sync_error = None;
        }
        self.save_outbox();
        flushed
    }

    async fn send(&self, write: &PendingWrite) -> Result<(), AppError> {
        match write {
            PendingWrite::Upsert(acc) => self.store.save_account(&self.user_token, acc).await,
            PendingWrite::Delete(id) => self.store.delete_account(id).await,
        }
    }

    async fn persist(&mut self, write: PendingWrite) {
        self.pending.retain(|w| w.account_id() != write.account_id());
        if let Err(e) = self.send(&write).await {
            warn!(id = write.account_id(), error = %e, "store write failed; queued for retry");
            self.sync_error = Some(format!("Could not save to the cloud: {e}"));
            self.pending.push(write);
        }
        self.save_outbox();
    }

    fn save_outbox(&self) {
        if let Some(outbox) = &self.outbox {
            if let Err(e) = prefs::save_pending_writes(outbox.as_ref(), &self.pending) {
                warn!(error = %e, "could not save the outbox");
            }
        }
    }
}
