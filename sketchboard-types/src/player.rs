use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub type PlayerId = Uuid;

/// A connected participant. Exists for the lifetime of one transport session;
/// reconnection is not modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub room_code: Option<String>,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, default_suffix: u16) -> Self {
        Self {
            id,
            name: format!("Player{:03}", default_suffix % 1000),
            room_code: None,
            score: 0,
        }
    }

    pub fn as_member_view(&self, is_owner: bool) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            is_owner,
            score: self.score,
        }
    }
}

/// Public, client-facing view of a player. Never carries anything secret.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_owner: bool,
    pub score: u32,
}

/// Validates and normalizes a candidate display name.
///
/// Trims whitespace, requires 1-20 chars after trimming.
pub fn normalize_player_name(raw: &str) -> Result<String, crate::RoomError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 20 {
        return Err(crate::RoomError::InvalidName);
    }
    Ok(trimmed.to_string())
}
