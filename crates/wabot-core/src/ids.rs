use crate::config::AVATAR_COLORS;
use crate::types::BotAccount;
use chrono::Utc;

pub const INSTANCE_ID_LEN: usize = 13;

/// Random 13-digit uppercase hex display id (e.g. `692C275AE02BB`).
///
/// Built from a v4 UUID with the fixed version and variant nibbles dropped,
/// so every digit is random.
pub fn instance_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex.char_indices()
        .filter(|(i, _)| *i != 12 && *i != 16)
        .map(|(_, c)| c.to_ascii_uppercase())
        .take(INSTANCE_ID_LEN)
        .collect()
}

/// Timestamp-derived account id, bumped past any id already in `existing`.
pub fn account_id(existing: &[BotAccount]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while existing.iter().any(|a| a.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

pub fn avatar_color(index: usize) -> &'static str {
    AVATAR_COLORS[index % AVATAR_COLORS.len()]
}

pub fn is_instance_id(s: &str) -> bool {
    s.len() == INSTANCE_ID_LEN && s.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}
