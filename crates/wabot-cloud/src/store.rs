use crate::failure_text;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wabot_core::config::STORE_TABLE;
use wabot_core::error::AppError;
use wabot_core::interfaces::AccountStore;
use wabot_core::prefs;
use wabot_core::types::{BotAccount, StoreConfig};

/// SQL to create the table this store reads and writes.
pub const BOT_NODES_SCHEMA: &str = r#"create table if not exists public.bot_nodes (
  id          text primary key,
  user_token  text not null,
  data        jsonb not null,
  updated_at  timestamptz not null default now()
);

create index if not exists bot_nodes_user_token_idx on public.bot_nodes (user_token);

alter table public.bot_nodes enable row level security;

create policy "console access" on public.bot_nodes
  for all using (true) with check (true);
"#;

/// Account rows in a PostgREST table store (Supabase).
pub struct SupabaseStore {
    client: reqwest::Client,
    table_url: String,
}

// --- Row types ---

#[derive(Serialize)]
struct UpsertRow<'a> {
    id: &'a str,
    user_token: &'a str,
    data: &'a BotAccount,
}

#[derive(Deserialize)]
struct StoredRow {
    id: String,
    data: serde_json::Value,
}

impl SupabaseStore {
    pub fn new(cfg: &StoreConfig) -> Result<Self, AppError> {
        prefs::validate_store_config(cfg)?;

        let invalid = |e: reqwest::header::InvalidHeaderValue| {
            AppError::InvalidStoreConfig(format!("Invalid API key: {e}"))
        };
        let key = cfg.key.trim();
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            table_url: format!(
                "{}/rest/v1/{STORE_TABLE}",
                cfg.url.trim().trim_end_matches('/')
            ),
        })
    }
}

#[async_trait]
impl AccountStore for SupabaseStore {
    async fn load_accounts(&self, user_token: &str) -> Result<Vec<BotAccount>, AppError> {
        let resp = self
            .client
            .get(&self.table_url)
            .query(&[("select", "*".to_string()), ("user_token", format!("eq.{user_token}"))])
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Store(format!(
                "Load accounts failed ({})",
                failure_text(resp).await
            )));
        }

        let rows: Vec<StoredRow> = resp
            .json()
            .await
            .map_err(|e| AppError::Store(format!("Unreadable account rows: {e}")))?;

        // One corrupt row should not hide the others.
        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<BotAccount>(row.data) {
                Ok(acc) => accounts.push(acc),
                Err(e) => warn!(id = %row.id, error = %e, "skipping unreadable account row"),
            }
        }
        debug!(count = accounts.len(), "accounts loaded from store");
        Ok(accounts)
    }

    async fn save_account(&self, user_token: &str, account: &BotAccount) -> Result<(), AppError> {
        let body = UpsertRow {
            id: &account.id,
            user_token,
            data: account,
        };
        let resp = self
            .client
            .post(&self.table_url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Store(format!(
                "Save account {} failed ({})",
                account.id,
                failure_text(resp).await
            )));
        }
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> Result<(), AppError> {
        let resp = self
            .client
            .delete(&self.table_url)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Store(format!(
                "Delete account {id} failed ({})",
                failure_text(resp).await
            )));
        }
        Ok(())
    }
}
