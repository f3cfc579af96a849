use crate::config::DEFAULT_INSTRUCTION;
use crate::error::AppError;
use crate::interfaces::RunnerApi;
use crate::registry::SharedRegistry;
use crate::types::{BotAccount, BotConfig, UpdateConfigRequest};
use serde::Serialize;
use tracing::{info, warn};

/// Result of [`ConfigEditor::save`]. The local save always happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// No runner URL: saved to the registry only.
    LocalOnly,
    /// The runner accepted the new config.
    Remote { message: Option<String> },
    /// Saved locally, but the runner push failed.
    RemoteFailed { error: String },
}

/// Staged edits for one account's bot configuration.
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    account_id: String,
    draft: BotConfig,
    is_active: bool,
    runner_url: Option<String>,
    dirty: bool,
    last_failed: bool,
}

impl ConfigEditor {
    pub fn open(account: &BotAccount, runner_url: Option<String>) -> Self {
        Self {
            account_id: account.id.clone(),
            draft: account.config.clone(),
            is_active: account.is_active,
            runner_url,
            dirty: false,
            last_failed: false,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn draft(&self) -> &BotConfig {
        &self.draft
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn runner_url(&self) -> Option<&str> {
        self.runner_url.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Saving is offered for unsaved edits and to retry a failed push.
    pub fn can_save(&self) -> bool {
        self.dirty || self.last_failed
    }

    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.draft.system_instruction = text.into();
        self.dirty = true;
    }

    /// Clamped to the 0.0..=1.0 range of the input control.
    pub fn set_temperature(&mut self, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.draft.temperature = (value * 10.0).round() / 10.0;
        self.dirty = true;
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.dirty = true;
    }

    /// Track the runner URL the caller just stored; does not mark dirty.
    pub fn set_runner_url(&mut self, url: Option<String>) {
        self.runner_url = url.filter(|u| !u.trim().is_empty());
    }

    pub fn reset_instruction(&mut self) {
        self.set_instruction(DEFAULT_INSTRUCTION);
    }

    /// Write the draft to the registry, then push it to the runner if one is set.
    ///
    /// The registry is only locked for the local write, not during the push.
    pub async fn save(
        &mut self,
        registry: &SharedRegistry,
        runner: &dyn RunnerApi,
    ) -> Result<SaveOutcome, AppError> {
        if !self.can_save() {
            return Err(AppError::NothingToSave);
        }

        {
            let mut registry = registry.lock().await;
            let mut account = registry.require(&self.account_id)?.clone();
            account.config = self.draft.clone();
            account.is_active = self.is_active;
            registry.update(account).await?;
        }

        let Some(url) = self.runner_url.clone() else {
            self.dirty = false;
            self.last_failed = false;
            return Ok(SaveOutcome::LocalOnly);
        };

        let request = UpdateConfigRequest {
            system_instruction: self.draft.system_instruction.clone(),
            temperature: self.draft.temperature,
            is_active: self.is_active,
        };
        let outcome = match runner.push_config(&url, &request).await {
            Ok(ack) if ack.success => {
                info!(account = %self.account_id, "config pushed to runner");
                SaveOutcome::Remote { message: ack.message }
            }
            Ok(ack) => SaveOutcome::RemoteFailed {
                error: ack
                    .message
                    .unwrap_or_else(|| "Runner rejected the configuration".into()),
            },
            Err(e) => SaveOutcome::RemoteFailed {
                error: e.to_string(),
            },
        };

        match &outcome {
            SaveOutcome::RemoteFailed { error } => {
                warn!(account = %self.account_id, %error, "runner config push failed");
                self.last_failed = true;
            }
            _ => {
                self.dirty = false;
                self.last_failed = false;
            }
        }
        Ok(outcome)
    }
}
