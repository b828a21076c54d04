use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Expected, adversarial-input-shaped outcomes. Never raised for internal faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoomError {
    #[error("invalid payload")]
    InvalidPayload,
    #[error("room or player not found")]
    NotFound,
    #[error("already in a room")]
    AlreadyIn,
    #[error("room is not accepting new players")]
    NotWaiting,
    #[error("room is full")]
    Full,
    #[error("already in this room")]
    Duplicate,
    #[error("max players below current membership")]
    TooSmall,
    #[error("only the owner can do this")]
    NotOwner,
    #[error("not enough players to start")]
    TooFewPlayers,
    #[error("not valid in the current phase")]
    WrongPhase,
    #[error("only the drawer can do this")]
    NotDrawer,
    #[error("the drawer cannot guess")]
    DrawerCannotGuess,
    #[error("already guessed correctly this round")]
    AlreadyGuessed,
    #[error("invalid player name")]
    InvalidName,
    #[error("input too long")]
    TooLong,
    #[error("input too short")]
    TooShort,
    #[error("no word has been selected")]
    NoWord,
    #[error("could not mint a unique room code")]
    IdExhausted,
}
