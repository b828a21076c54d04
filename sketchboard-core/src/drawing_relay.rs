use serde_json::Value;
use sketchboard_types::{GamePhase, GameState, PlayerId, RoomError};

const MOVE_MIN_INTERVAL_MS: u64 = 1000 / 30;
const BATCH_WINDOW_MS: u64 = 50;

/// Stateless with respect to stroke content -- the server never interprets
/// the payload, only throttles and batches its delivery.
#[derive(Debug, Default)]
pub struct DrawingRelay {
    last_emit_ms: Option<u64>,
    pending_batch: Vec<Value>,
    batch_opened_ms: Option<u64>,
}

pub enum RelayOutcome {
    /// Emit immediately (draw_start/draw_end/clear_canvas, or a move outside
    /// the throttle window with no pending batch).
    EmitNow(Value),
    /// A move was buffered into the current batch; nothing to send yet.
    Buffered,
    /// The batch window elapsed or this emit flushed it: send the whole batch.
    FlushBatch(Vec<Value>),
}

impl DrawingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(game: &GameState, player_id: PlayerId) -> Result<(), RoomError> {
        if game.phase != GamePhase::Drawing {
            return Err(RoomError::WrongPhase);
        }
        if player_id != game.drawer_id {
            return Err(RoomError::NotDrawer);
        }
        Ok(())
    }

    /// Returns any batch that was pending in the throttle window so the
    /// caller can deliver it before the `draw_start` event itself.
    pub fn draw_start(
        &mut self,
        game: &GameState,
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    ) -> Result<(Option<Vec<Value>>, Value), RoomError> {
        Self::validate(game, player_id)?;
        let flushed = self.flush_and_reset(now_ms);
        Ok((flushed, payload))
    }

    /// Returns any batch that was pending in the throttle window so the
    /// caller can deliver it before the `draw_end` event itself.
    pub fn draw_end(
        &mut self,
        game: &GameState,
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    ) -> Result<(Option<Vec<Value>>, Value), RoomError> {
        Self::validate(game, player_id)?;
        let flushed = self.flush_and_reset(now_ms);
        Ok((flushed, payload))
    }

    /// Returns any batch that was pending in the throttle window so the
    /// caller can deliver it before the `clear_canvas` event itself.
    pub fn clear_canvas(
        &mut self,
        game: &GameState,
        player_id: PlayerId,
        now_ms: u64,
    ) -> Result<Option<Vec<Value>>, RoomError> {
        Self::validate(game, player_id)?;
        Ok(self.flush_and_reset(now_ms))
    }

    pub fn draw_move(
        &mut self,
        game: &GameState,
        player_id: PlayerId,
        payload: Value,
        now_ms: u64,
    ) -> Result<RelayOutcome, RoomError> {
        Self::validate(game, player_id)?;

        let within_throttle = self
            .last_emit_ms
            .map(|last| now_ms.saturating_sub(last) < MOVE_MIN_INTERVAL_MS)
            .unwrap_or(false);

        if !within_throttle && self.pending_batch.is_empty() {
            self.last_emit_ms = Some(now_ms);
            return Ok(RelayOutcome::EmitNow(payload));
        }

        if self.pending_batch.is_empty() {
            self.batch_opened_ms = Some(now_ms);
        }
        self.pending_batch.push(payload);

        let window_elapsed = self
            .batch_opened_ms
            .map(|opened| now_ms.saturating_sub(opened) >= BATCH_WINDOW_MS)
            .unwrap_or(false);

        if !within_throttle || window_elapsed {
            self.last_emit_ms = Some(now_ms);
            Ok(RelayOutcome::FlushBatch(std::mem::take(&mut self.pending_batch)))
        } else {
            Ok(RelayOutcome::Buffered)
        }
    }

    /// Any batch window still open that the caller should flush on a bare
    /// timer tick (no new event arrived to trigger it naturally).
    pub fn take_stale_batch(&mut self, now_ms: u64) -> Option<Vec<Value>> {
        let opened = self.batch_opened_ms?;
        if now_ms.saturating_sub(opened) >= BATCH_WINDOW_MS && !self.pending_batch.is_empty() {
            self.last_emit_ms = Some(now_ms);
            Some(std::mem::take(&mut self.pending_batch))
        } else {
            None
        }
    }

    /// Ends the current throttle window, returning whatever batch was still
    /// pending so the caller can deliver it instead of silently dropping it.
    fn flush_and_reset(&mut self, now_ms: u64) -> Option<Vec<Value>> {
        self.batch_opened_ms = None;
        self.last_emit_ms = Some(now_ms);
        let batch = std::mem::take(&mut self.pending_batch);
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    /// Called on round_end: discards any in-flight throttling/batch state.
    pub fn reset_for_round(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn drawing_game(drawer: PlayerId) -> GameState {
        GameState {
            phase: GamePhase::Drawing,
            current_round: 1,
            total_rounds: 1,
            drawer_index: 0,
            drawer_id: drawer,
            round_start_time_ms: 0,
            selected_word: Some("cat".into()),
            masked_word: Some("_ _ _".into()),
            guessed_players: HashSet::new(),
        }
    }

    #[test]
    fn non_drawer_move_is_rejected() {
        let drawer = PlayerId::new_v4();
        let other = PlayerId::new_v4();
        let game = drawing_game(drawer);
        let mut relay = DrawingRelay::new();

        let err = relay
            .draw_move(&game, other, Value::Null, 0)
            .unwrap_err();
        assert_eq!(err, RoomError::NotDrawer);
    }

    #[test]
    fn first_move_emits_immediately_then_throttles() {
        let drawer = PlayerId::new_v4();
        let game = drawing_game(drawer);
        let mut relay = DrawingRelay::new();

        match relay.draw_move(&game, drawer, Value::from(1), 0).unwrap() {
            RelayOutcome::EmitNow(_) => {}
            _ => panic!("expected immediate emit"),
        }

        match relay.draw_move(&game, drawer, Value::from(2), 5).unwrap() {
            RelayOutcome::Buffered => {}
            _ => panic!("expected buffering within throttle window"),
        }
    }

    #[test]
    fn batch_flushes_after_window_elapses() {
        let drawer = PlayerId::new_v4();
        let game = drawing_game(drawer);
        let mut relay = DrawingRelay::new();

        relay.draw_move(&game, drawer, Value::from(1), 0).unwrap();
        relay.draw_move(&game, drawer, Value::from(2), 5).unwrap();

        match relay.draw_move(&game, drawer, Value::from(3), 60).unwrap() {
            RelayOutcome::FlushBatch(batch) => assert_eq!(batch.len(), 2),
            _ => panic!("expected flush after window elapsed"),
        }
    }

    #[test]
    fn draw_start_returns_pending_batch_for_delivery() {
        let drawer = PlayerId::new_v4();
        let game = drawing_game(drawer);
        let mut relay = DrawingRelay::new();

        relay.draw_move(&game, drawer, Value::from(1), 0).unwrap();
        relay.draw_move(&game, drawer, Value::from(2), 5).unwrap();
        let (flushed, payload) = relay.draw_start(&game, drawer, Value::Null, 10).unwrap();

        assert_eq!(flushed.map(|b| b.len()), Some(2));
        assert_eq!(payload, Value::Null);
        assert!(relay.take_stale_batch(1000).is_none());
    }
}
