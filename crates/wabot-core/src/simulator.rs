use crate::interfaces::ChatBackend;
use crate::types::{BotAccount, BotConfig, ChatMessage, ChatTurn, DeliveryStatus, Sender};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

pub const AI_ERROR_REPLY: &str = "Sorry, something went wrong with the AI service.";

/// In-console stand-in for a WhatsApp chat with one account's bot.
///
/// The transcript lives only as long as the selected account does.
pub struct ChatSimulator {
    backend: Arc<dyn ChatBackend>,
    account_id: Option<String>,
    transcript: Vec<ChatMessage>,
    session_config: Option<BotConfig>,
    history: Vec<ChatTurn>,
    next_id: u64,
}

impl ChatSimulator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            account_id: None,
            transcript: Vec::new(),
            session_config: None,
            history: Vec::new(),
            next_id: 0,
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Point the simulator at `account_id`, clearing the transcript on change.
    pub fn switch_account(&mut self, account_id: &str) {
        if self.account_id.as_deref() != Some(account_id) {
            self.account_id = Some(account_id.to_string());
            self.transcript.clear();
            self.session_config = None;
            self.history.clear();
        }
    }

    /// Whether `account` would answer at all.
    pub fn will_reply(account: &BotAccount) -> bool {
        account.is_active && account.is_connected()
    }

    /// Append the user's message and, if the bot is live, its reply.
    ///
    /// Returns the bot message when one was produced. AI failures turn into
    /// a canned reply rather than an error.
    pub async fn send(&mut self, account: &BotAccount, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        self.switch_account(&account.id);

        let user_msg = self.message(text, Sender::User, DeliveryStatus::Sent);
        self.transcript.push(user_msg);

        if !Self::will_reply(account) {
            return None;
        }

        if self.session_config.as_ref() != Some(&account.config) {
            self.session_config = Some(account.config.clone());
            self.history.clear();
        }

        let reply = match self.backend.reply(&account.config, &self.history, text).await {
            Ok(reply) => {
                self.history.push(ChatTurn {
                    sender: Sender::User,
                    text: text.to_string(),
                });
                self.history.push(ChatTurn {
                    sender: Sender::Bot,
                    text: reply.clone(),
                });
                reply
            }
            Err(e) => {
                warn!(account = %account.id, error = %e, "chat reply failed");
                AI_ERROR_REPLY.to_string()
            }
        };

        let bot_msg = self.message(&reply, Sender::Bot, DeliveryStatus::Read);
        self.transcript.push(bot_msg.clone());
        Some(bot_msg)
    }

    fn message(&mut self, text: &str, sender: Sender, status: DeliveryStatus) -> ChatMessage {
        self.next_id += 1;
        let now = Utc::now();
        ChatMessage {
            id: format!("{}-{}", now.timestamp_millis(), self.next_id),
            text: text.to_string(),
            sender,
            timestamp: now,
            status,
        }
    }
}
