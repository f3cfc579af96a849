//! Presentation for the console: terminal widgets used by the CLI and the
//! browser console served by `wabot serve`.

pub mod term;
#[cfg(feature = "web")]
pub mod web;
