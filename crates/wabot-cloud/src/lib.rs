//! HTTP implementations of the console's outside-world traits.

pub mod gemini;
pub mod runner;
pub mod store;

pub use gemini::{GeminiClient, UnconfiguredChat};
pub use runner::HttpRunner;
pub use store::SupabaseStore;

/// Read the body of a failed response for the error message.
pub(crate) async fn failure_text(resp: reqwest::Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if text.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {text}")
    }
}
