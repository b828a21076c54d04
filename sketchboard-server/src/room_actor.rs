use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};

use sketchboard_core::{
    DrawingRelay, GameEngine, GuessEngine, PlayerRegistry, Room, RoomPhase, RoomRegistry,
    ScoreEngine, ScoreLedger, TimerKind, TimerService, WordEngine,
};
use sketchboard_types::{PlayerId, RoomError, RoomSettingsUpdate, RoomView};

use crate::config::Config;
use crate::websocket::connection::{ConnectionId, ConnectionManager};

const INTER_ROUND_PAUSE_SECS: u32 = 3;

/// Shared, process-wide state. The only lock contended across rooms is the
/// player registry and the mailbox directory; everything else belongs to a
/// single room's actor task.
pub struct AppState {
    pub config: Config,
    pub connections: Arc<ConnectionManager>,
    pub players: Arc<RwLock<PlayerRegistry>>,
    pub timers: TimerService,
    mailboxes: Arc<RwLock<HashMap<String, mpsc::Sender<RoomCommand>>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connections: Arc::new(ConnectionManager::new()),
            players: Arc::new(RwLock::new(PlayerRegistry::new())),
            timers: TimerService::new(),
            mailboxes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mints the room and binds the creator's connection/player record to it
    /// before the actor is spawned, so there is no window where the actor is
    /// running but the creator isn't yet reachable for the initial broadcast.
    pub async fn create_room(
        &self,
        connection_id: ConnectionId,
        owner_id: PlayerId,
        settings: Option<RoomSettingsUpdate>,
    ) -> Result<String, RoomError> {
        let mut registry = RoomRegistry::new();
        let room = registry.create(owner_id, settings)?;
        let code = room.code.clone();
        let room = registry.get(&code).expect("just created").clone();

        self.connections.set_room(connection_id, Some(code.clone())).await;
        self.players.write().await.set_room(owner_id, Some(code.clone()));

        let (tx, rx) = mpsc::channel(128);
        let actor = RoomActor {
            room,
            registry,
            players: self.players.clone(),
            connections: self.connections.clone(),
            timers: self.timers.clone(),
            score_ledger: ScoreLedger::new(),
            relay: DrawingRelay::new(),
            rx,
            self_tx: tx.clone(),
        };
        tokio::spawn(actor.run());

        self.mailboxes.write().await.insert(code.clone(), tx);
        Ok(code)
    }

    pub async fn mailbox(&self, code: &str) -> Option<mpsc::Sender<RoomCommand>> {
        self.mailboxes.read().await.get(&code.to_uppercase()).cloned()
    }

    pub async fn remove_mailbox(&self, code: &str) {
        self.mailboxes.write().await.remove(&code.to_uppercase());
    }
}

pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<RoomView, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
    },
    UpdateSettings {
        player_id: PlayerId,
        update: RoomSettingsUpdate,
    },
    StartGame {
        player_id: PlayerId,
        now_ms: u64,
    },
    SelectWord {
        player_id: PlayerId,
        word: String,
    },
    DrawStart {
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    },
    DrawMove {
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    },
    DrawEnd {
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    },
    ClearCanvas {
        player_id: PlayerId,
        now_ms: u64,
    },
    Guess {
        player_id: PlayerId,
        guess: String,
        now_ms: u64,
    },
    PlayAgain {
        player_id: PlayerId,
    },
    TimerTick {
        kind: TimerKind,
        remaining_secs: u32,
    },
    TimerExpiry {
        kind: TimerKind,
    },
    Disconnect {
        player_id: PlayerId,
    },
    PlayerRenamed {
        player_id: PlayerId,
    },
}

/// Owns one room's mutable state outright. Every command is processed to
/// completion before the next is pulled off the mailbox, which is what
/// realizes per-room serialization: no two commands for the same room are
/// ever interleaved.
struct RoomActor {
    room: Room,
    registry: RoomRegistry,
    players: Arc<RwLock<PlayerRegistry>>,
    connections: Arc<ConnectionManager>,
    timers: TimerService,
    score_ledger: ScoreLedger,
    relay: DrawingRelay,
    rx: mpsc::Receiver<RoomCommand>,
    self_tx: mpsc::Sender<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        let view = {
            let players = self.players.read().await;
            self.room.to_view(&players)
        };
        self.connections
            .send_to_player(
                self.room.owner_id,
                sketchboard_types::ServerMessage::RoomCreated { room: view },
            )
            .await;

        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd).await;
            if self.room.player_ids.is_empty() {
                break;
            }
        }
        self.timers.stop_timer(&self.room.code).await;
    }

    async fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { player_id, reply } => {
                let current_room = self
                    .players
                    .read()
                    .await
                    .get(player_id)
                    .and_then(|p| p.room_code.clone());
                if let Some(existing) = current_room {
                    if existing.to_uppercase() != self.room.code {
                        let _ = reply.send(Err(RoomError::AlreadyIn));
                        return;
                    }
                }
                let joined = self.registry.join(player_id, &self.room.code).map(|room| room.clone());
                match joined {
                    Ok(room) => {
                        self.room = room;
                        let players = self.players.read().await;
                        let view = self.room.to_view(&players);
                        drop(players);
                        let _ = reply.send(Ok(view));
                        self.broadcast_room_updated().await;
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::Leave { player_id } => {
                self.on_leave(player_id).await;
            }
            RoomCommand::Disconnect { player_id } => {
                self.on_leave(player_id).await;
            }
            RoomCommand::UpdateSettings { player_id, update } => {
                match self
                    .registry
                    .update_settings(player_id, &self.room.code, &update)
                {
                    Ok(room) => {
                        self.room = room.clone();
                        self.broadcast_settings_updated().await;
                    }
                    Err(err) => {
                        self.connections
                            .send_to_player(
                                player_id,
                                sketchboard_types::ServerMessage::RoomSettingsError { error: err },
                            )
                            .await;
                    }
                }
            }
            RoomCommand::StartGame { player_id, now_ms } => {
                self.on_start_game(player_id, now_ms).await;
            }
            RoomCommand::SelectWord { player_id, word } => {
                self.on_select_word(player_id, &word).await;
            }
            RoomCommand::DrawStart {
                player_id,
                payload,
                now_ms,
            } => self.on_draw_event(player_id, payload, now_ms, DrawKind::Start).await,
            RoomCommand::DrawMove {
                player_id,
                payload,
                now_ms,
            } => self.on_draw_move(player_id, payload, now_ms).await,
            RoomCommand::DrawEnd {
                player_id,
                payload,
                now_ms,
            } => self.on_draw_event(player_id, payload, now_ms, DrawKind::End).await,
            RoomCommand::ClearCanvas { player_id, now_ms } => {
                self.on_clear_canvas(player_id, now_ms).await
            }
            RoomCommand::Guess {
                player_id,
                guess,
                now_ms,
            } => self.on_guess(player_id, &guess, now_ms).await,
            RoomCommand::PlayAgain { player_id } => self.on_play_again(player_id).await,
            RoomCommand::TimerTick {
                kind,
                remaining_secs,
            } => {
                self.connections
                    .broadcast_to_room(
                        &self.room.code,
                        sketchboard_types::ServerMessage::TimerTick {
                            remaining_secs,
                            kind,
                        },
                    )
                    .await;
                if kind == TimerKind::Drawing {
                    self.flush_stale_batch().await;
                }
            }
            RoomCommand::TimerExpiry { kind } => self.on_timer_expiry(kind).await,
            RoomCommand::PlayerRenamed { player_id: _ } => {
                self.broadcast_room_updated().await;
            }
        }
    }

    async fn on_leave(&mut self, player_id: PlayerId) {
        self.players.write().await.set_room(player_id, None);
        let in_game = matches!(self.room.phase, RoomPhase::InGame(_));
        if in_game {
            if let Some(outcome) = self.registry.remove_mid_game(player_id, &self.room.code) {
                if let Some(room) = self.registry.get(&self.room.code) {
                    self.room = room.clone();
                }
                if outcome.room_empty {
                    self.registry.remove_room(&self.room.code);
                    return;
                }
                if outcome.was_drawer {
                    self.end_round_and_advance().await;
                } else {
                    self.broadcast_room_updated().await;
                }
            }
        } else if let Some(still_exists) = self.registry.leave(player_id, &self.room.code) {
            if !still_exists {
                return;
            }
            if let Some(room) = self.registry.get(&self.room.code) {
                self.room = room.clone();
            }
            self.broadcast_room_updated().await;
        }
    }

    async fn on_start_game(&mut self, player_id: PlayerId, now_ms: u64) {
        match GameEngine::start_game(&mut self.room, player_id, now_ms) {
            Ok(()) => {
                let mut players = self.players.write().await;
                ScoreEngine::reset_scores(&self.room, &mut players);
                drop(players);
                self.score_ledger.reset_round();
                self.connections
                    .broadcast_to_room(
                        &self.room.code,
                        sketchboard_types::ServerMessage::GameStarted {
                            total_rounds: self.room.settings.rounds,
                        },
                    )
                    .await;
                self.open_word_select().await;
            }
            Err(err) => self.send_error(player_id, err).await,
        }
    }

    async fn open_word_select(&mut self) {
        let Some(game) = self.room.game() else { return };
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::RoundStarted {
                    round: game.current_round,
                    drawer_id: game.drawer_id,
                },
            )
            .await;

        let options = WordEngine::generate_options(&self.room.settings);
        self.connections
            .send_to_player(
                game.drawer_id,
                sketchboard_types::ServerMessage::WordOptions {
                    options,
                    timeout_secs: sketchboard_core::WORD_SELECTION_TIMEOUT_SECS,
                },
            )
            .await;

        self.arm_timer(
            TimerKind::WordSelection,
            sketchboard_core::WORD_SELECTION_TIMEOUT_SECS,
        );
    }

    async fn on_select_word(&mut self, player_id: PlayerId, word: &str) {
        let Some(game) = self.room.game_mut() else {
            self.send_error(player_id, RoomError::WrongPhase).await;
            return;
        };
        match WordEngine::select_word(game, player_id, word) {
            Ok(()) => self.start_drawing_phase(false).await,
            Err(err) => self.send_error(player_id, err).await,
        }
    }

    async fn start_drawing_phase(&mut self, auto_selected: bool) {
        self.timers.stop_timer(&self.room.code).await;
        let now_ms = now_ms();
        let Some(game) = self.room.game_mut() else { return };
        GameEngine::enter_drawing(game, now_ms);
        let masked = game.masked_word.clone().unwrap_or_default();
        let drawer_id = game.drawer_id;

        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::WordSelected {
                    masked_word: masked.clone(),
                    auto_selected,
                },
            )
            .await;

        if let Some(view) = self.room.game().map(|g| sketchboard_types::DrawerGameStateView {
            base: sketchboard_types::GameStateView::from(g),
            word: g.selected_word.clone().unwrap_or_default(),
        }) {
            self.connections
                .send_to_player(
                    drawer_id,
                    sketchboard_types::ServerMessage::DrawingStarted { state: view },
                )
                .await;
        }
        for player_id in self.room.player_ids.iter().filter(|id| **id != drawer_id) {
            self.connections
                .send_to_player(
                    *player_id,
                    sketchboard_types::ServerMessage::DrawingStartedForGuesser {
                        masked_word: masked.clone(),
                        drawer_id,
                    },
                )
                .await;
        }

        self.arm_timer(TimerKind::Drawing, self.room.settings.draw_time);
    }

    async fn on_draw_event(
        &mut self,
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
        kind: DrawKind,
    ) {
        let Some(game) = self.room.game().cloned() else {
            self.send_error(player_id, RoomError::WrongPhase).await;
            return;
        };
        let result = match kind {
            DrawKind::Start => self.relay.draw_start(&game, player_id, payload, now_ms),
            DrawKind::End => self.relay.draw_end(&game, player_id, payload, now_ms),
        };
        match result {
            Ok((flushed, payload)) => {
                if let Some(batch) = flushed {
                    self.broadcast_except(
                        player_id,
                        sketchboard_types::ServerMessage::DrawMove { payload: batch },
                    )
                    .await;
                }
                let msg = match kind {
                    DrawKind::Start => sketchboard_types::ServerMessage::DrawStart { payload },
                    DrawKind::End => sketchboard_types::ServerMessage::DrawEnd { payload },
                };
                self.broadcast_except(player_id, msg).await;
            }
            Err(err) => self.send_error(player_id, err).await,
        }
    }

    async fn on_draw_move(&mut self, player_id: PlayerId, payload: Value, now_ms: u64) {
        let Some(game) = self.room.game().cloned() else {
            self.send_error(player_id, RoomError::WrongPhase).await;
            return;
        };
        match self.relay.draw_move(&game, player_id, payload, now_ms) {
            Ok(sketchboard_core::RelayOutcome::EmitNow(payload)) => {
                self.broadcast_except(
                    player_id,
                    sketchboard_types::ServerMessage::DrawMove {
                        payload: vec![payload],
                    },
                )
                .await;
            }
            Ok(sketchboard_core::RelayOutcome::FlushBatch(batch)) => {
                self.broadcast_except(
                    player_id,
                    sketchboard_types::ServerMessage::DrawMove { payload: batch },
                )
                .await;
            }
            Ok(sketchboard_core::RelayOutcome::Buffered) => {}
            Err(err) => self.send_error(player_id, err).await,
        }
    }

    async fn on_clear_canvas(&mut self, player_id: PlayerId, now_ms: u64) {
        let Some(game) = self.room.game().cloned() else {
            self.send_error(player_id, RoomError::WrongPhase).await;
            return;
        };
        match self.relay.clear_canvas(&game, player_id, now_ms) {
            Ok(flushed) => {
                if let Some(batch) = flushed {
                    self.broadcast_except(
                        player_id,
                        sketchboard_types::ServerMessage::DrawMove { payload: batch },
                    )
                    .await;
                }
                self.broadcast_except(player_id, sketchboard_types::ServerMessage::ClearCanvas)
                    .await;
            }
            Err(err) => self.send_error(player_id, err).await,
        }
    }

    async fn on_guess(&mut self, player_id: PlayerId, guess: &str, now_ms: u64) {
        let round_start = self.room.game().map(|g| g.round_start_time_ms).unwrap_or(0);
        let draw_time = self.room.settings.draw_time;
        let player_count = self.room.player_ids.len();

        let Some(game) = self.room.game_mut() else {
            self.send_error(player_id, RoomError::WrongPhase).await;
            return;
        };
        let outcome = match GuessEngine::validate_guess(game, player_id, guess) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.send_error(player_id, err).await;
                return;
            }
        };

        let chat_message = if outcome.is_correct {
            outcome.normalized.clone()
        } else {
            "*".repeat(outcome.normalized.chars().count())
        };
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::ChatMessage {
                    player_id,
                    message: chat_message,
                    is_correct: outcome.is_correct,
                },
            )
            .await;

        if !outcome.is_correct {
            return;
        }

        let elapsed_ms = now_ms.saturating_sub(round_start);
        let score = self.score_ledger.award_guesser(player_id, elapsed_ms, draw_time);
        {
            let mut players = self.players.write().await;
            ScoreEngine::add_score(&mut players, player_id, score);
        }
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::CorrectGuess {
                    player_id,
                    word: outcome.normalized.clone(),
                },
            )
            .await;
        self.broadcast_leaderboard().await;

        let game = self.room.game().expect("checked above");
        if GuessEngine::all_guessers_guessed(game, player_count) {
            self.end_round_and_advance().await;
        }
    }

    async fn end_round_and_advance(&mut self) {
        self.timers.stop_timer(&self.room.code).await;
        self.relay.reset_for_round();

        let drawer_id = self.room.game().map(|g| g.drawer_id).unwrap_or_default();
        let correct_guessers = self
            .room
            .game()
            .map(|g| g.guessed_players.len())
            .unwrap_or(0);
        let word = self
            .room
            .game()
            .and_then(|g| g.selected_word.clone())
            .unwrap_or_default();

        let outcome = match GameEngine::end_round(&mut self.room) {
            Ok(outcome) => outcome,
            Err(_) => return,
        };

        if correct_guessers > 0 {
            let drawer_award = self.score_ledger.award_drawer(correct_guessers);
            let mut players = self.players.write().await;
            ScoreEngine::add_score(&mut players, drawer_id, drawer_award);
        }
        self.score_ledger.reset_round();

        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::RoundEnded {
                    word,
                    phase: sketchboard_types::GamePhase::RoundEnd,
                },
            )
            .await;
        self.broadcast_leaderboard().await;

        if outcome.game_ended {
            GameEngine::end_game(&mut self.room).ok();
            let leaderboard = {
                let players = self.players.read().await;
                ScoreEngine::leaderboard(&self.room, &players)
            };
            self.connections
                .broadcast_to_room(
                    &self.room.code,
                    sketchboard_types::ServerMessage::GameEnded { leaderboard },
                )
                .await;
            return;
        }

        self.arm_timer(TimerKind::InterRound, INTER_ROUND_PAUSE_SECS);
    }

    async fn on_timer_expiry(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::WordSelection => {
                let settings = self.room.settings.clone();
                let Some(game) = self.room.game_mut() else { return };
                WordEngine::auto_select_word(game, &settings);
                self.start_drawing_phase(true).await;
            }
            TimerKind::Drawing => {
                self.end_round_and_advance().await;
            }
            TimerKind::InterRound => {
                if GameEngine::progress_to_next_drawer(&mut self.room).is_ok() {
                    self.open_word_select().await;
                }
            }
        }
    }

    async fn on_play_again(&mut self, player_id: PlayerId) {
        if self.room.owner_id != player_id {
            self.send_error(player_id, RoomError::NotOwner).await;
            return;
        }
        GameEngine::reset_game(&mut self.room);
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::GameReset {
                    room: {
                        let players = self.players.read().await;
                        self.room.to_view(&players)
                    },
                },
            )
            .await;
    }

    fn arm_timer(&self, kind: TimerKind, duration_secs: u32) {
        let tx = self.self_tx.clone();
        let tx_expiry = self.self_tx.clone();
        self.timers.start_timer(
            self.room.code.clone(),
            kind,
            std::time::Duration::from_secs(duration_secs as u64),
            move |kind, remaining_secs| {
                let _ = tx.try_send(RoomCommand::TimerTick {
                    kind,
                    remaining_secs,
                });
            },
            move |kind| {
                let _ = tx_expiry.try_send(RoomCommand::TimerExpiry { kind });
            },
        );
    }

    async fn broadcast_room_updated(&self) {
        let players = self.players.read().await;
        let view = self.room.to_view(&players);
        self.connections
            .broadcast_to_room(&self.room.code, sketchboard_types::ServerMessage::RoomUpdated { room: view })
            .await;
    }

    async fn broadcast_settings_updated(&self) {
        let players = self.players.read().await;
        let view = self.room.to_view(&players);
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::RoomSettingsUpdated { room: view },
            )
            .await;
    }

    async fn broadcast_leaderboard(&self) {
        let players = self.players.read().await;
        let leaderboard = ScoreEngine::leaderboard(&self.room, &players);
        self.connections
            .broadcast_to_room(
                &self.room.code,
                sketchboard_types::ServerMessage::LeaderboardUpdate { leaderboard },
            )
            .await;
    }

    /// Flushes a `draw_move` batch left open by the throttle window when no
    /// further move arrived to trigger the flush naturally.
    async fn flush_stale_batch(&mut self) {
        let Some(drawer_id) = self.room.game().map(|g| g.drawer_id) else { return };
        if let Some(batch) = self.relay.take_stale_batch(now_ms()) {
            self.broadcast_except(
                drawer_id,
                sketchboard_types::ServerMessage::DrawMove { payload: batch },
            )
            .await;
        }
    }

    async fn broadcast_except(&self, exclude: PlayerId, message: sketchboard_types::ServerMessage) {
        for player_id in self.room.player_ids.iter().filter(|id| **id != exclude) {
            self.connections.send_to_player(*player_id, message.clone()).await;
        }
    }

    async fn send_error(&self, player_id: PlayerId, error: RoomError) {
        self.connections
            .send_to_player(player_id, sketchboard_types::ServerMessage::GameError { error })
            .await;
    }
}

enum DrawKind {
    Start,
    End,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
