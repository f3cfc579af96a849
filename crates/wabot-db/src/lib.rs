//! SQLite-backed key/value preferences (session user, store override,
//! per-account runner URLs).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use wabot_core::config;
use wabot_core::error::AppError;
use wabot_core::interfaces::Preferences;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS preferences (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        debug!(path = %path.display(), "preferences opened");
        Self::init(conn)
    }

    /// ~/.wabot/console.db
    pub fn open_default() -> Result<Self, AppError> {
        Self::open(&config::prefs_path()?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Every key currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<String>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key FROM preferences ORDER BY key")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Preferences("preferences lock poisoned".into()))
    }
}

impl Preferences for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.lock()?
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?
            .execute(
                "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.lock()?
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> AppError {
    AppError::Preferences(e.to_string())
}
