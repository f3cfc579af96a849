use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Account record ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Scanning,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
    Syncing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub system_instruction: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotAccount {
    pub id: String,
    pub instance_id: String,
    pub user_id: String,
    pub phone_number: String,
    pub name: String,
    pub is_active: bool,
    pub status: ConnectionStatus,
    pub config: BotConfig,
    pub avatar_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    pub server_status: ServerStatus,
    #[serde(default)]
    pub messages_count: u64,
}

impl BotAccount {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Badge shown on the dashboard card.
    pub fn badge(&self) -> &'static str {
        match (self.status, self.is_active) {
            (ConnectionStatus::Connected, true) => "CONNECTED",
            (ConnectionStatus::Connected, false) => "PAUSED",
            _ => "OFFLINE",
        }
    }

    /// First letter of the name, uppercased, for avatars.
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

// --- Session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
}

// --- Chat transcript ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

/// One turn of the AI conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub sender: Sender,
    pub text: String,
}

// --- Runner HTTP API ---

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrStatus {
    #[serde(default)]
    pub qr: Option<String>,
    pub status: String,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub system_instruction: String,
    pub temperature: f32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunnerAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pairing status reported by a runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RunnerStatus {
    Initializing,
    ScanNeeded,
    Connecting,
    Connected,
    Error,
    Resetting,
    Other(String),
}

impl RunnerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::ScanNeeded => "SCAN_NEEDED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Error => "ERROR",
            Self::Resetting => "RESETTING",
            Self::Other(s) => s,
        }
    }

    /// Waiting for the user to scan a QR code.
    pub fn awaiting_scan(&self) -> bool {
        matches!(self, Self::ScanNeeded | Self::Connecting)
    }
}

impl From<String> for RunnerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INITIALIZING" => Self::Initializing,
            "SCAN_NEEDED" => Self::ScanNeeded,
            "CONNECTING" => Self::Connecting,
            "CONNECTED" => Self::Connected,
            "ERROR" => Self::Error,
            "RESETTING" => Self::Resetting,
            _ => Self::Other(s),
        }
    }
}

impl From<RunnerStatus> for String {
    fn from(s: RunnerStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_reads_camel_case_blob() {
        let blob = json!({
            "id": "1733100000000",
            "instanceId": "692C275AE02BB",
            "userId": "admin_master_id",
            "phoneNumber": "+39 333 0000000",
            "name": "Pizzeria",
            "isActive": true,
            "status": "connected",
            "config": { "systemInstruction": "hi", "temperature": 0.4 },
            "avatarColor": "bg-blue-600",
            "lastActive": "2025-01-02T10:00:00.000Z",
            "serverStatus": "online",
            "messagesCount": 3
        });
        let acc: BotAccount = serde_json::from_value(blob).unwrap();
        assert_eq!(acc.instance_id, "692C275AE02BB");
        assert_eq!(acc.status, ConnectionStatus::Connected);
        assert!(acc.last_active.is_some());
        assert_eq!(acc.badge(), "CONNECTED");
    }

    #[test]
    fn runner_status_keeps_unknown_strings() {
        let s: RunnerStatus = serde_json::from_value(json!("WARMING_UP")).unwrap();
        assert_eq!(s, RunnerStatus::Other("WARMING_UP".into()));
        assert_eq!(serde_json::to_value(RunnerStatus::ScanNeeded).unwrap(), json!("SCAN_NEEDED"));
    }
}
