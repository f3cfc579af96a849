pub mod accounts;
pub mod auth;
pub mod chat;
pub mod config;
pub mod connect;
pub mod db;
pub mod export;
#[cfg(feature = "web-ui")]
pub mod serve;
