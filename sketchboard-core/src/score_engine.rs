use std::collections::HashMap;

use sketchboard_types::{LeaderboardEntry, PlayerId};

use crate::player_registry::PlayerRegistry;
use crate::room_registry::Room;

const DRAWER_POINTS_PER_GUESSER: u32 = 50;

/// Per-room, per-round dedup of awards so a racy double-award (e.g. a retried
/// guess) never pays out twice for the same player in the same round.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    awarded_this_round: HashMap<PlayerId, u32>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_round(&mut self) {
        self.awarded_this_round.clear();
    }

    /// Awards a time-weighted score for a correct guess at `elapsed_ms` into
    /// the round. Returns the score actually earned (0 if already awarded).
    pub fn award_guesser(
        &mut self,
        player_id: PlayerId,
        elapsed_ms: u64,
        draw_time_secs: u32,
    ) -> u32 {
        if let Some(prev) = self.awarded_this_round.get(&player_id) {
            return *prev;
        }

        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        let draw_time = draw_time_secs.max(1) as f64;
        let ratio = (elapsed_secs / draw_time).clamp(0.0, 1.0);
        let score = (100.0 + 100.0 * (1.0 - ratio)).floor().max(10.0) as u32;

        self.awarded_this_round.insert(player_id, score);
        score
    }

    pub fn award_drawer(&self, correct_guessers: usize) -> u32 {
        DRAWER_POINTS_PER_GUESSER * correct_guessers as u32
    }
}

pub struct ScoreEngine;

impl ScoreEngine {
    pub fn reset_scores(room: &Room, players: &mut PlayerRegistry) {
        for id in &room.player_ids {
            if let Some(player) = players.get_mut(*id) {
                player.score = 0;
            }
        }
    }

    pub fn add_score(players: &mut PlayerRegistry, player_id: PlayerId, amount: u32) {
        if let Some(player) = players.get_mut(player_id) {
            player.score += amount;
        }
    }

    pub fn leaderboard(room: &Room, players: &PlayerRegistry) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = room
            .player_ids
            .iter()
            .filter_map(|id| players.get(*id))
            .map(|p| LeaderboardEntry {
                player_id: p.id,
                name: p.name.clone(),
                score: p.score,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_guesser_scales_with_elapsed_time_and_floors_at_10() {
        let mut ledger = ScoreLedger::new();
        let player = PlayerId::new_v4();

        let fast = ledger.award_guesser(player, 10_000, 80);
        assert_eq!(fast, 187);

        ledger.reset_round();
        let slow = ledger.award_guesser(PlayerId::new_v4(), 80_000, 80);
        assert_eq!(slow, 100);

        ledger.reset_round();
        let overtime = ledger.award_guesser(PlayerId::new_v4(), 200_000, 80);
        assert_eq!(overtime, 100);
    }

    #[test]
    fn award_guesser_is_idempotent_per_round() {
        let mut ledger = ScoreLedger::new();
        let player = PlayerId::new_v4();

        let first = ledger.award_guesser(player, 5_000, 80);
        let second = ledger.award_guesser(player, 79_000, 80);
        assert_eq!(first, second);
    }

    #[test]
    fn drawer_award_is_fifty_per_correct_guesser() {
        let ledger = ScoreLedger::new();
        assert_eq!(ledger.award_drawer(3), 150);
        assert_eq!(ledger.award_drawer(0), 0);
    }

    #[test]
    fn leaderboard_sorts_descending_stable_on_ties() {
        let mut players = PlayerRegistry::new();
        let p1 = PlayerId::new_v4();
        let p2 = PlayerId::new_v4();
        players.create("s1".into(), p1);
        players.create("s2".into(), p2);
        players.get_mut(p1).unwrap().score = 50;
        players.get_mut(p2).unwrap().score = 50;

        let room = crate::room_registry::Room {
            code: "X".into(),
            owner_id: p1,
            player_ids: vec![p1, p2],
            settings: sketchboard_types::RoomSettings::default(),
            phase: crate::room_registry::RoomPhase::Waiting,
        };

        let board = ScoreEngine::leaderboard(&room, &players);
        assert_eq!(board[0].player_id, p1);
        assert_eq!(board[1].player_id, p2);
    }
}
