use crate::failure_text;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wabot_core::config::{DEFAULT_CHAT_API_BASE, DEFAULT_CHAT_MODEL};
use wabot_core::error::AppError;
use wabot_core::interfaces::ChatBackend;
use wabot_core::types::{BotConfig, ChatTurn, Sender};

pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    api_base: String,
}

// --- Request / Response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

fn turn<'a>(sender: Sender, text: &'a str) -> Content<'a> {
    Content {
        role: Some(match sender {
            Sender::User => "user",
            Sender::Bot => "model",
        }),
        parts: vec![Part { text }],
    }
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        let key = api_key.trim();
        if key.is_empty() {
            return Err(AppError::Chat("No Gemini API key configured".into()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(key).map_err(|e| AppError::Chat(format!("Invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_base: DEFAULT_CHAT_API_BASE.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn reply(
        &self,
        config: &BotConfig,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AppError> {
        let mut contents: Vec<Content<'_>> = history.iter().map(|t| turn(t.sender, &t.text)).collect();
        contents.push(turn(Sender::User, message));

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &config.system_instruction,
                }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: config.temperature,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Chat(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Chat(format!(
                "generateContent failed ({})",
                failure_text(resp).await
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Chat(format!("Unexpected response: {e}")))?;
        debug!(model = %self.model, turns = history.len() + 1, "chat reply received");
        Ok(parsed.text())
    }
}

/// Stand-in used when no API key is configured; every reply fails and the
/// simulator shows its canned error message.
pub struct UnconfiguredChat;

#[async_trait]
impl ChatBackend for UnconfiguredChat {
    async fn reply(&self, _: &BotConfig, _: &[ChatTurn], _: &str) -> Result<String, AppError> {
        Err(AppError::Chat("No Gemini API key configured".into()))
    }
}
