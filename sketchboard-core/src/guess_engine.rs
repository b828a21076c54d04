use sketchboard_types::{GamePhase, GameState, PlayerId, RoomError};

const MAX_GUESS_LEN: usize = 50;

/// Normalization and adjudication of guesses. Correctness tracking lives on
/// `GameState::guessed_players`; this module never mutates score.
pub struct GuessEngine;

pub struct GuessOutcome {
    pub normalized: String,
    pub is_correct: bool,
}

impl GuessEngine {
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn validate_guess(
        game: &mut GameState,
        player_id: PlayerId,
        raw_guess: &str,
    ) -> Result<GuessOutcome, RoomError> {
        if game.phase != GamePhase::Drawing {
            return Err(RoomError::WrongPhase);
        }
        if player_id == game.drawer_id {
            return Err(RoomError::DrawerCannotGuess);
        }
        if game.guessed_players.contains(&player_id) {
            return Err(RoomError::AlreadyGuessed);
        }

        let normalized = Self::normalize(raw_guess);
        if normalized.is_empty() {
            return Err(RoomError::TooShort);
        }
        if normalized.chars().count() > MAX_GUESS_LEN {
            return Err(RoomError::TooLong);
        }

        let target = game.selected_word.as_ref().ok_or(RoomError::NoWord)?;
        let is_correct = normalized == *target;
        if is_correct {
            game.guessed_players.insert(player_id);
        }

        Ok(GuessOutcome {
            normalized,
            is_correct,
        })
    }

    pub fn all_guessers_guessed(game: &GameState, player_count: usize) -> bool {
        game.guessed_players.len() >= player_count.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn game_with_word(drawer: PlayerId, word: &str) -> GameState {
        GameState {
            phase: GamePhase::Drawing,
            current_round: 1,
            total_rounds: 1,
            drawer_index: 0,
            drawer_id: drawer,
            round_start_time_ms: 0,
            selected_word: Some(word.to_string()),
            masked_word: Some("_ _ _".into()),
            guessed_players: HashSet::new(),
        }
    }

    #[test]
    fn correct_guess_with_padding_and_case_still_matches() {
        let drawer = PlayerId::new_v4();
        let guesser = PlayerId::new_v4();
        let mut game = game_with_word(drawer, "cat");

        let outcome = GuessEngine::validate_guess(&mut game, guesser, "  Cat ").unwrap();
        assert!(outcome.is_correct);
        assert!(game.guessed_players.contains(&guesser));
    }

    #[test]
    fn drawer_cannot_guess_and_double_guess_rejected() {
        let drawer = PlayerId::new_v4();
        let guesser = PlayerId::new_v4();
        let mut game = game_with_word(drawer, "cat");

        assert_eq!(
            GuessEngine::validate_guess(&mut game, drawer, "cat"),
            Err(RoomError::DrawerCannotGuess)
        );

        GuessEngine::validate_guess(&mut game, guesser, "dog").unwrap();
        assert_eq!(
            GuessEngine::validate_guess(&mut game, guesser, "cat"),
            Err(RoomError::AlreadyGuessed)
        );
    }

    #[test]
    fn all_guessers_guessed_counts_everyone_but_drawer() {
        let drawer = PlayerId::new_v4();
        let mut game = game_with_word(drawer, "cat");
        game.guessed_players.insert(PlayerId::new_v4());
        assert!(!GuessEngine::all_guessers_guessed(&game, 3));
        game.guessed_players.insert(PlayerId::new_v4());
        assert!(GuessEngine::all_guessers_guessed(&game, 3));
    }
}
