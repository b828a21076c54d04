use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::player::PlayerId;
use crate::room::{DrawerGameStateView, GamePhase, LeaderboardEntry, RoomSettingsUpdate, RoomView};
use crate::RoomError;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetPlayerName { name: String },
    CreateRoom { settings: Option<RoomSettingsUpdate> },
    JoinRoom { room_id: String },
    LeaveRoom,
    UpdateRoomSettings { settings: RoomSettingsUpdate },
    StartGame,
    SelectWord { word: String },
    DrawStart { payload: Value },
    DrawMove { payload: Value },
    DrawEnd { payload: Value },
    ClearCanvas,
    Guess { guess: String },
    PlayAgain,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { player_id: PlayerId },
    PlayerUpdated { player_id: PlayerId, name: String },
    RoomUpdated { room: RoomView },
    RoomCreated { room: RoomView },
    RoomJoined { room: RoomView },
    RoomLeft,
    RoomError { error: RoomError },
    RoomSettingsUpdated { room: RoomView },
    RoomSettingsError { error: RoomError },
    GameStarted { total_rounds: u32 },
    GameError { error: RoomError },
    WordOptions { options: Vec<String>, timeout_secs: u32 },
    WordSelected { masked_word: String, auto_selected: bool },
    RoundStarted { round: u32, drawer_id: PlayerId },
    DrawingStarted { state: DrawerGameStateView },
    DrawingStartedForGuesser { masked_word: String, drawer_id: PlayerId },
    TimerTick { remaining_secs: u32, kind: TimerKind },
    DrawStart { payload: Value },
    DrawMove { payload: Vec<Value> },
    DrawEnd { payload: Value },
    ClearCanvas,
    ChatMessage { player_id: PlayerId, message: String, is_correct: bool },
    CorrectGuess { player_id: PlayerId, word: String },
    LeaderboardUpdate { leaderboard: Vec<LeaderboardEntry> },
    RoundEnded { word: String, phase: GamePhase },
    GameEnded { leaderboard: Vec<LeaderboardEntry> },
    GameReset { room: RoomView },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    WordSelection,
    Drawing,
    InterRound,
}
