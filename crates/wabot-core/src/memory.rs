//! In-process implementations of the storage traits.
//!
//! `MemoryStore` backs the console when no hosted store is configured
//! (nothing survives a restart); both types double as test fixtures.

use crate::error::AppError;
use crate::interfaces::{AccountStore, Preferences};
use crate::types::BotAccount;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPrefs {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.values
            .lock()
            .map_err(|_| AppError::Preferences("preferences lock poisoned".into()))
    }
}

impl Preferences for MemoryPrefs {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Rows keyed by account id, each tagged with its owner token.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, (String, BotAccount)>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<BotAccount> {
        self.rows
            .lock()
            .ok()
            .and_then(|r| r.get(id).map(|(_, acc)| acc.clone()))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn load_accounts(&self, user_token: &str) -> Result<Vec<BotAccount>, AppError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| AppError::Store("store lock poisoned".into()))?;
        Ok(rows
            .values()
            .filter(|(token, _)| token == user_token)
            .map(|(_, acc)| acc.clone())
            .collect())
    }

    async fn save_account(&self, user_token: &str, account: &BotAccount) -> Result<(), AppError> {
        self.rows
            .lock()
            .map_err(|_| AppError::Store("store lock poisoned".into()))?
            .insert(account.id.clone(), (user_token.to_string(), account.clone()));
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> Result<(), AppError> {
        self.rows
            .lock()
            .map_err(|_| AppError::Store("store lock poisoned".into()))?
            .remove(id);
        Ok(())
    }
}
