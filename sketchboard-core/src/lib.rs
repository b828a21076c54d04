pub mod drawing_relay;
pub mod game_engine;
pub mod guess_engine;
pub mod player_registry;
pub mod room_registry;
pub mod score_engine;
pub mod timer_service;
pub mod word_engine;

pub use drawing_relay::{DrawingRelay, RelayOutcome};
pub use game_engine::{GameEngine, RoundEndOutcome};
pub use guess_engine::{GuessEngine, GuessOutcome};
pub use player_registry::{PlayerRegistry, SessionHandle};
pub use room_registry::{MidGameLeave, Room, RoomPhase, RoomRegistry};
pub use score_engine::{ScoreEngine, ScoreLedger};
pub use timer_service::{TimerKind, TimerService};
pub use word_engine::{mask_word, WordEngine, WORD_SELECTION_TIMEOUT_SECS};
