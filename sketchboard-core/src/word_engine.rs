use rand::seq::SliceRandom;
use rand::thread_rng;

use sketchboard_types::{GamePhase, GameState, PlayerId, RoomError, RoomSettings};

const BUILTIN_WORDS: &[&str] = &[
    "apple", "banana", "cherry", "dolphin", "elephant", "forest", "guitar", "hammer", "island",
    "jacket", "kitten", "ladder", "mountain", "needle", "ocean", "pencil", "queen", "rabbit",
    "sunset", "turtle", "umbrella", "volcano", "window", "xylophone", "yogurt", "zebra",
    "anchor", "bridge", "candle", "dragon", "engine", "feather", "garden", "helmet", "igloo",
    "jungle", "kettle", "lantern", "mirror", "notebook", "orchard", "pyramid", "quilt", "rocket",
    "shadow", "tunnel", "unicorn", "violin", "whistle", "bicycle", "campfire", "dolphin fin",
    "eyeglasses", "fireplace", "grapevine", "hourglass", "iceberg", "jackpot", "keyboard",
    "lighthouse", "marshmallow", "notepad", "octopus", "pinwheel", "quicksand", "raincoat",
    "sandwich", "toothbrush", "waterfall", "zeppelin", "armor", "blanket", "cupcake", "diamond",
    "envelope", "fountain", "glacier", "harmonica", "ice cream", "jigsaw", "kaleidoscope",
    "lollipop", "magnet", "nectar", "oasis", "parrot", "quiver", "raccoon", "scarecrow",
    "telescope", "urn", "vineyard", "wagon", "yarn", "zipper", "anchorman", "buffalo", "compass",
    "driftwood", "eagle", "falcon", "gazebo", "harpoon", "inkwell", "jester", "knapsack",
];

pub const WORD_SELECTION_TIMEOUT_SECS: u32 = 15;
const OPTION_COUNT: usize = 3;

/// Word pool composition, secrecy-preserving selection, masking, and the
/// deterministic hint-reveal schedule.
pub struct WordEngine;

impl WordEngine {
    pub fn word_pool(settings: &RoomSettings) -> Vec<String> {
        let mut pool: Vec<String> = BUILTIN_WORDS.iter().map(|w| w.to_string()).collect();
        let mut seen: std::collections::HashSet<&str> = BUILTIN_WORDS.iter().copied().collect();
        for custom in &settings.custom_words {
            if seen.insert(custom.as_str()) {
                pool.push(custom.clone());
            }
        }
        pool
    }

    /// Unbiased sampling without replacement via `rand`'s reservoir-based
    /// `choose_multiple` -- never a `DefaultHasher`/`SystemTime` shuffle.
    pub fn generate_options(settings: &RoomSettings) -> Vec<String> {
        let pool = Self::word_pool(settings);
        let count = OPTION_COUNT.min(pool.len());
        pool.choose_multiple(&mut thread_rng(), count)
            .cloned()
            .collect()
    }

    pub fn select_word(
        game: &mut GameState,
        caller: PlayerId,
        word: &str,
    ) -> Result<(), RoomError> {
        if game.phase != GamePhase::WordSelect {
            return Err(RoomError::WrongPhase);
        }
        if caller != game.drawer_id {
            return Err(RoomError::NotDrawer);
        }
        Self::apply_word(game, word);
        Ok(())
    }

    /// Invoked by the timer service when word-selection expires unattended.
    pub fn auto_select_word(game: &mut GameState, settings: &RoomSettings) {
        let options = Self::generate_options(settings);
        let word = options.first().cloned().unwrap_or_else(|| "word".to_string());
        Self::apply_word(game, &word);
    }

    fn apply_word(game: &mut GameState, word: &str) {
        let normalized = word.trim().to_lowercase();
        game.masked_word = Some(mask_word(&normalized));
        game.selected_word = Some(normalized);
        game.phase = GamePhase::Drawing;
    }

    /// Positions (0-indexed into non-space characters is NOT used here --
    /// indices are into the raw word, spaces are simply never selected) that
    /// should be revealed once `hint_count` hints have been granted.
    pub fn hint_reveal_positions(word: &str, hint_count: usize) -> Vec<usize> {
        let offsets = [2usize, 3, 1, 0];
        let mut positions = Vec::new();
        let len = word.chars().count();
        let mut granted = 0;

        'outer: for &offset in &offsets {
            let mut pos = offset;
            while pos < len {
                if word.chars().nth(pos).map(|c| c != ' ').unwrap_or(false) {
                    positions.push(pos);
                    granted += 1;
                    if granted >= hint_count {
                        break 'outer;
                    }
                }
                pos += 4;
            }
        }
        positions
    }
}

/// Underscores stand in for letters, one join-space between underscores
/// within a word; a literal space between words becomes a second join-space
/// rather than a masked character, so word boundaries stay visually distinct.
pub fn mask_word(word: &str) -> String {
    word.split(' ')
        .map(|part| vec!["_"; part.chars().count()].join(" "))
        .collect::<Vec<String>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn mask_word_puts_underscore_per_nonspace_char() {
        assert_eq!(mask_word("cat"), "_ _ _");
        assert_eq!(mask_word("ice cream"), "_ _ _  _ _ _ _ _");
    }

    #[test]
    fn generate_options_are_distinct_and_from_pool() {
        let settings = RoomSettings::default();
        let pool: HashSet<String> = WordEngine::word_pool(&settings).into_iter().collect();
        let options = WordEngine::generate_options(&settings);

        assert_eq!(options.len(), 3);
        let unique: HashSet<&String> = options.iter().collect();
        assert_eq!(unique.len(), options.len());
        for opt in &options {
            assert!(pool.contains(opt));
        }
    }

    #[test]
    fn generate_options_includes_custom_words_in_pool() {
        let settings = RoomSettings {
            custom_words: vec!["zzzcustom".to_string()],
            ..RoomSettings::default()
        };
        let pool = WordEngine::word_pool(&settings);
        assert!(pool.contains(&"zzzcustom".to_string()));
    }

    #[test]
    fn select_word_rejects_non_drawer_and_wrong_phase() {
        let drawer = PlayerId::new_v4();
        let other = PlayerId::new_v4();
        let mut game = GameState {
            phase: GamePhase::WordSelect,
            current_round: 1,
            total_rounds: 1,
            drawer_index: 0,
            drawer_id: drawer,
            round_start_time_ms: 0,
            selected_word: None,
            masked_word: None,
            guessed_players: HashSet::new(),
        };

        assert_eq!(
            WordEngine::select_word(&mut game, other, "cat"),
            Err(RoomError::NotDrawer)
        );

        WordEngine::select_word(&mut game, drawer, "Cat ").unwrap();
        assert_eq!(game.selected_word.as_deref(), Some("cat"));
        assert_eq!(game.phase, GamePhase::Drawing);

        assert_eq!(
            WordEngine::select_word(&mut game, drawer, "dog"),
            Err(RoomError::WrongPhase)
        );
    }

    #[test]
    fn hint_schedule_follows_stride_four_offsets() {
        let positions = WordEngine::hint_reveal_positions("abcdefghij", 4);
        assert_eq!(positions, vec![2, 6, 3, 7]);
    }
}
