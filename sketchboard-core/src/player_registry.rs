use std::collections::HashMap;

use rand::Rng;
use sketchboard_types::{normalize_player_name, Player, PlayerId, RoomError};

/// Session-handle is whatever the transport layer uses to identify a socket;
/// kept generic here (a `String`) so the registry has no transport dependency.
pub type SessionHandle = String;

/// Double-indexed store of connected players: by id and by session handle.
/// No I/O, no locking -- the owning actor/task is responsible for synchronization.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    by_session: HashMap<SessionHandle, PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, session: SessionHandle, id: PlayerId) -> &Player {
        let suffix = rand::thread_rng().gen_range(0..1000);
        let player = Player::new(id, suffix);
        self.by_session.insert(session, id);
        self.players.entry(id).or_insert(player)
    }

    pub fn remove(&mut self, id: PlayerId) {
        self.players.remove(&id);
        self.by_session.retain(|_, v| *v != id);
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn by_session(&self, session: &str) -> Option<PlayerId> {
        self.by_session.get(session).copied()
    }

    pub fn set_name(&mut self, id: PlayerId, raw_name: &str) -> Result<String, RoomError> {
        let name = normalize_player_name(raw_name)?;
        if let Some(player) = self.players.get_mut(&id) {
            player.name = name.clone();
        }
        Ok(name)
    }

    pub fn set_room(&mut self, id: PlayerId, room_code: Option<String>) {
        if let Some(player) = self.players.get_mut(&id) {
            player.room_code = room_code;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_lookup_by_session_and_id() {
        let mut registry = PlayerRegistry::new();
        let id = PlayerId::new_v4();
        registry.create("session-1".to_string(), id);

        assert_eq!(registry.by_session("session-1"), Some(id));
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn remove_is_noop_for_missing_player() {
        let mut registry = PlayerRegistry::new();
        registry.remove(PlayerId::new_v4());
        assert_eq!(registry.players.len(), 0);
    }

    #[test]
    fn set_name_trims_and_rejects_overlong() {
        let mut registry = PlayerRegistry::new();
        let id = PlayerId::new_v4();
        registry.create("s".to_string(), id);

        let name = registry.set_name(id, "  Alice  ").unwrap();
        assert_eq!(name, "Alice");

        let err = registry
            .set_name(id, &"x".repeat(21))
            .expect_err("should reject");
        assert_eq!(err, RoomError::InvalidName);
    }

    #[test]
    fn remove_clears_session_index() {
        let mut registry = PlayerRegistry::new();
        let id = PlayerId::new_v4();
        registry.create("session".to_string(), id);
        registry.remove(id);

        assert_eq!(registry.by_session("session"), None);
        assert!(registry.get(id).is_none());
    }
}
