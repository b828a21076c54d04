use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::player::{PlayerId, PlayerView};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 12;
pub const MIN_DRAW_TIME: u32 = 30;
pub const MAX_DRAW_TIME: u32 = 120;
pub const MAX_ROUNDS: u32 = 10;
pub const MAX_CUSTOM_WORDS: usize = 50;
pub const MAX_CUSTOM_WORD_LEN: usize = 50;

/// Room-wide configuration, mutable only by the owner while the room is waiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSettings {
    pub max_players: u32,
    pub draw_time: u32,
    pub rounds: u32,
    pub hints: bool,
    pub custom_words: Vec<String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 8,
            draw_time: 80,
            rounds: 3,
            hints: true,
            custom_words: Vec::new(),
        }
    }
}

/// Partial settings as submitted by a client; fields absent from the request
/// keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSettingsUpdate {
    pub max_players: Option<u32>,
    pub draw_time: Option<u32>,
    pub rounds: Option<u32>,
    pub hints: Option<bool>,
    pub custom_words: Option<Vec<String>>,
}

impl RoomSettings {
    /// Applies an update, clamping every numeric field into its valid range
    /// rather than rejecting out-of-range input.
    pub fn apply_update(&self, update: &RoomSettingsUpdate) -> Self {
        let mut next = self.clone();
        if let Some(max_players) = update.max_players {
            next.max_players = max_players.clamp(MIN_PLAYERS as u32, MAX_PLAYERS as u32);
        }
        if let Some(draw_time) = update.draw_time {
            next.draw_time = draw_time.clamp(MIN_DRAW_TIME, MAX_DRAW_TIME);
        }
        if let Some(rounds) = update.rounds {
            next.rounds = rounds.clamp(1, MAX_ROUNDS);
        }
        if let Some(hints) = update.hints {
            next.hints = hints;
        }
        if let Some(custom_words) = &update.custom_words {
            next.custom_words = normalize_custom_words(custom_words);
        }
        next
    }
}

fn normalize_custom_words(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut words = Vec::new();
    for word in raw {
        let trimmed = word.trim().to_lowercase();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_CUSTOM_WORD_LEN {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            words.push(trimmed);
        }
        if words.len() >= MAX_CUSTOM_WORDS {
            break;
        }
    }
    words
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    WordSelect,
    Drawing,
    RoundEnd,
    GameEnd,
}

/// Server-internal, authoritative game state. `selected_word` lives here and
/// nowhere else, so no serialized view can leak it by accident.
#[derive(Debug, Clone)]
pub struct GameState {
    pub phase: GamePhase,
    pub current_round: u32,
    pub total_rounds: u32,
    pub drawer_index: usize,
    pub drawer_id: PlayerId,
    pub round_start_time_ms: u64,
    pub selected_word: Option<String>,
    pub masked_word: Option<String>,
    pub guessed_players: std::collections::HashSet<PlayerId>,
}

/// What every non-drawer client sees. Physically incapable of holding the
/// secret word: there is no field for it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameStateView {
    pub phase: GamePhase,
    pub current_round: u32,
    pub total_rounds: u32,
    pub drawer_id: PlayerId,
    pub drawer_index: usize,
    pub masked_word: Option<String>,
    pub guessed_players: Vec<PlayerId>,
}

/// What the current drawer sees during `drawing`: the one view allowed to
/// carry the plaintext word.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DrawerGameStateView {
    #[serde(flatten)]
    pub base: GameStateView,
    pub word: String,
}

impl From<&GameState> for GameStateView {
    fn from(game: &GameState) -> Self {
        Self {
            phase: game.phase,
            current_round: game.current_round,
            total_rounds: game.total_rounds,
            drawer_id: game.drawer_id,
            drawer_index: game.drawer_index,
            masked_word: game.masked_word.clone(),
            guessed_players: game.guessed_players.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomView {
    pub code: String,
    pub owner_id: PlayerId,
    pub players: Vec<PlayerView>,
    pub settings: RoomSettings,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}
