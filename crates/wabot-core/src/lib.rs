//! Console logic for managing WhatsApp bot accounts: the account registry,
//! per-account bot configuration, runner pairing and the chat simulator.

pub mod auth;
pub mod config;
pub mod editor;
pub mod error;
pub mod ids;
pub mod interfaces;
pub mod memory;
pub mod pairing;
pub mod prefs;
pub mod progress;
pub mod registry;
pub mod session;
pub mod simulator;
pub mod types;

pub use error::AppError;
