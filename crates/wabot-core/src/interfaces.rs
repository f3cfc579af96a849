//! Seams between the console logic and the outside world.
//!
//! `wabot-cloud` implements the HTTP-backed traits and `wabot-db` implements
//! [`Preferences`]; tests substitute in-memory doubles.

use crate::error::AppError;
use crate::types::{BotAccount, BotConfig, ChatTurn, QrStatus, RunnerAck, UpdateConfigRequest};
use async_trait::async_trait;

/// Hosted table store holding one row per account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Every account row stored under `user_token`.
    async fn load_accounts(&self, user_token: &str) -> Result<Vec<BotAccount>, AppError>;

    /// Insert or replace the row keyed by `account.id`.
    async fn save_account(&self, user_token: &str, account: &BotAccount) -> Result<(), AppError>;

    async fn delete_account(&self, id: &str) -> Result<(), AppError>;
}

/// HTTP API of an externally deployed runner.
#[async_trait]
pub trait RunnerApi: Send + Sync {
    /// `GET {base_url}/api/qr`
    async fn fetch_status(&self, base_url: &str) -> Result<QrStatus, AppError>;

    /// `POST {base_url}/api/update-config`
    async fn push_config(
        &self,
        base_url: &str,
        request: &UpdateConfigRequest,
    ) -> Result<RunnerAck, AppError>;

    /// `POST {base_url}/api/logout`
    async fn logout(&self, base_url: &str) -> Result<RunnerAck, AppError>;
}

/// Generative-AI chat endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(
        &self,
        config: &BotConfig,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AppError>;
}

/// Small persistent key/value store (the console's "local storage").
pub trait Preferences: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}
