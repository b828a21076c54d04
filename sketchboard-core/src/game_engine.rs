use std::collections::HashSet;

use sketchboard_types::{GamePhase, GameState, PlayerId, RoomError};

use crate::room_registry::{Room, RoomPhase};

/// Phase state machine and drawer/round rotation. Pure, synchronous, no I/O --
/// time is passed in by the caller rather than read from the clock here, so
/// these functions are trivially testable.
pub struct GameEngine;

pub struct RoundEndOutcome {
    pub game_ended: bool,
}

impl GameEngine {
    pub fn start_game(room: &mut Room, caller: PlayerId, now_ms: u64) -> Result<(), RoomError> {
        if !matches!(room.phase, RoomPhase::Waiting) {
            return Err(RoomError::NotWaiting);
        }
        if room.owner_id != caller {
            return Err(RoomError::NotOwner);
        }
        if room.player_ids.len() < 2 {
            return Err(RoomError::TooFewPlayers);
        }

        let drawer_id = room.player_ids[0];
        room.phase = RoomPhase::InGame(GameState {
            phase: GamePhase::WordSelect,
            current_round: 1,
            total_rounds: room.settings.rounds,
            drawer_index: 0,
            drawer_id,
            round_start_time_ms: now_ms,
            selected_word: None,
            masked_word: None,
            guessed_players: HashSet::new(),
        });
        Ok(())
    }

    pub fn start_round(game: &mut GameState) {
        game.phase = GamePhase::WordSelect;
        game.guessed_players.clear();
        game.selected_word = None;
        game.masked_word = None;
    }

    pub fn enter_drawing(game: &mut GameState, now_ms: u64) {
        game.phase = GamePhase::Drawing;
        game.round_start_time_ms = now_ms;
    }

    pub fn end_round(room: &mut Room) -> Result<RoundEndOutcome, RoomError> {
        let player_count = room.player_ids.len();
        let RoomPhase::InGame(game) = &mut room.phase else {
            return Err(RoomError::WrongPhase);
        };
        game.phase = GamePhase::RoundEnd;
        let is_last_drawer = game.drawer_index + 1 >= player_count;
        let is_last_round = game.current_round >= game.total_rounds;
        Ok(RoundEndOutcome {
            game_ended: is_last_drawer && is_last_round,
        })
    }

    /// Advances to the next drawer (incrementing the round if it wraps) and
    /// immediately opens the next word-selection phase.
    pub fn progress_to_next_drawer(room: &mut Room) -> Result<(), RoomError> {
        let player_count = room.player_ids.len();
        let game = room.game_mut().ok_or(RoomError::WrongPhase)?;

        game.drawer_index += 1;
        if game.drawer_index >= player_count {
            game.drawer_index = 0;
            game.current_round += 1;
        }
        game.drawer_id = room_drawer_id(room, game.drawer_index);
        let game = room.game_mut().expect("checked above");
        Self::start_round(game);
        Ok(())
    }

    pub fn end_game(room: &mut Room) -> Result<(), RoomError> {
        let game = match std::mem::replace(&mut room.phase, RoomPhase::Waiting) {
            RoomPhase::InGame(mut game) => {
                game.phase = GamePhase::GameEnd;
                game
            }
            other => {
                room.phase = other;
                return Err(RoomError::WrongPhase);
            }
        };
        room.phase = RoomPhase::Finished(game);
        Ok(())
    }

    pub fn reset_game(room: &mut Room) {
        room.phase = RoomPhase::Waiting;
    }
}

fn room_drawer_id(room: &Room, index: usize) -> PlayerId {
    room.player_ids[index.min(room.player_ids.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchboard_types::RoomSettings;

    fn room_with_players(n: usize) -> Room {
        let owner = PlayerId::new_v4();
        let mut player_ids = vec![owner];
        for _ in 1..n {
            player_ids.push(PlayerId::new_v4());
        }
        Room {
            code: "ABC123".into(),
            owner_id: owner,
            player_ids,
            settings: RoomSettings {
                rounds: 2,
                ..RoomSettings::default()
            },
            phase: RoomPhase::Waiting,
        }
    }

    #[test]
    fn start_game_requires_owner_and_min_players() {
        let mut room = room_with_players(1);
        let owner = room.owner_id;
        assert_eq!(
            GameEngine::start_game(&mut room, owner, 0),
            Err(RoomError::TooFewPlayers)
        );

        let mut room = room_with_players(2);
        let non_owner = room.player_ids[1];
        assert_eq!(
            GameEngine::start_game(&mut room, non_owner, 0),
            Err(RoomError::NotOwner)
        );

        let owner = room.owner_id;
        GameEngine::start_game(&mut room, owner, 0).unwrap();
        assert!(matches!(room.phase, RoomPhase::InGame(_)));
    }

    #[test]
    fn drawer_rotates_and_round_increments_on_wrap() {
        let mut room = room_with_players(2);
        let owner = room.owner_id;
        GameEngine::start_game(&mut room, owner, 0).unwrap();

        GameEngine::end_round(&mut room).unwrap();
        GameEngine::progress_to_next_drawer(&mut room).unwrap();
        let game = room.game().unwrap();
        assert_eq!(game.drawer_index, 1);
        assert_eq!(game.current_round, 1);

        GameEngine::end_round(&mut room).unwrap();
        GameEngine::progress_to_next_drawer(&mut room).unwrap();
        let game = room.game().unwrap();
        assert_eq!(game.drawer_index, 0);
        assert_eq!(game.current_round, 2);
    }

    #[test]
    fn end_round_reports_game_ended_on_last_drawer_last_round() {
        let mut room = room_with_players(2);
        let owner = room.owner_id;
        GameEngine::start_game(&mut room, owner, 0).unwrap();
        GameEngine::end_round(&mut room).unwrap();
        GameEngine::progress_to_next_drawer(&mut room).unwrap();
        GameEngine::end_round(&mut room).unwrap();
        GameEngine::progress_to_next_drawer(&mut room).unwrap();

        let outcome = GameEngine::end_round(&mut room).unwrap();
        assert!(outcome.game_ended);
    }

    #[test]
    fn reset_game_returns_room_to_waiting() {
        let mut room = room_with_players(2);
        let owner = room.owner_id;
        GameEngine::start_game(&mut room, owner, 0).unwrap();
        GameEngine::end_game(&mut room).unwrap();
        assert!(matches!(room.phase, RoomPhase::Finished(_)));

        GameEngine::reset_game(&mut room);
        assert!(matches!(room.phase, RoomPhase::Waiting));
    }
}
