use std::collections::HashMap;

use rand::Rng;
use sketchboard_types::{
    GameState, PlayerId, PlayerView, RoomError, RoomSettings, RoomSettingsUpdate,
    RoomStatus, RoomView,
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;
const MAX_MINT_ATTEMPTS: usize = 100;

/// The sum type from the design notes: a room's game-related state can only
/// ever be one of these three shapes, eliminating the nullable-`game`
/// invariant the naive model would need to enforce by hand.
#[derive(Debug, Clone)]
pub enum RoomPhase {
    Waiting,
    InGame(GameState),
    Finished(GameState),
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub owner_id: PlayerId,
    pub player_ids: Vec<PlayerId>,
    pub settings: RoomSettings,
    pub phase: RoomPhase,
}

impl Room {
    pub fn status(&self) -> RoomStatus {
        match self.phase {
            RoomPhase::Waiting => RoomStatus::Waiting,
            RoomPhase::InGame(_) => RoomStatus::InGame,
            RoomPhase::Finished(_) => RoomStatus::Finished,
        }
    }

    pub fn game(&self) -> Option<&GameState> {
        match &self.phase {
            RoomPhase::InGame(g) | RoomPhase::Finished(g) => Some(g),
            RoomPhase::Waiting => None,
        }
    }

    pub fn game_mut(&mut self) -> Option<&mut GameState> {
        match &mut self.phase {
            RoomPhase::InGame(g) | RoomPhase::Finished(g) => Some(g),
            RoomPhase::Waiting => None,
        }
    }

    pub fn to_view(&self, players: &crate::player_registry::PlayerRegistry) -> RoomView {
        let player_views = self
            .player_ids
            .iter()
            .filter_map(|id| players.get(*id))
            .map(|p| p.as_member_view(p.id == self.owner_id))
            .collect::<Vec<PlayerView>>();

        RoomView {
            code: self.code.clone(),
            owner_id: self.owner_id,
            players: player_views,
            settings: self.settings.clone(),
            status: self.status(),
        }
    }

}

/// Creates rooms, mints unique codes, and tracks membership. No engine logic
/// beyond membership lives here -- phase transitions are `game_engine`'s job.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(&code.to_uppercase())
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(&code.to_uppercase())
    }

    pub fn create(
        &mut self,
        owner_id: PlayerId,
        update: Option<RoomSettingsUpdate>,
    ) -> Result<&Room, RoomError> {
        let settings = match update {
            Some(update) => RoomSettings::default().apply_update(&update),
            None => RoomSettings::default(),
        };
        let code = self.mint_code()?;

        let room = Room {
            code: code.clone(),
            owner_id,
            player_ids: vec![owner_id],
            settings,
            phase: RoomPhase::Waiting,
        };
        self.rooms.insert(code.clone(), room);
        Ok(self.rooms.get(&code).expect("just inserted"))
    }

    fn mint_code(&self) -> Result<String, RoomError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_MINT_ATTEMPTS {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(RoomError::IdExhausted)
    }

    pub fn join(&mut self, player_id: PlayerId, code: &str) -> Result<&Room, RoomError> {
        let code = code.to_uppercase();
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;

        if !matches!(room.phase, RoomPhase::Waiting) {
            return Err(RoomError::NotWaiting);
        }
        if room.player_ids.contains(&player_id) {
            return Err(RoomError::Duplicate);
        }
        if room.player_ids.len() >= room.settings.max_players as usize {
            return Err(RoomError::Full);
        }

        room.player_ids.push(player_id);
        Ok(room)
    }

    /// Removes a player from their room. Returns `true` if the room still
    /// exists afterward (`false` means it was torn down because it's empty).
    pub fn leave(&mut self, player_id: PlayerId, code: &str) -> Option<bool> {
        let code = code.to_uppercase();
        let room = self.rooms.get_mut(&code)?;
        room.player_ids.retain(|id| *id != player_id);

        if room.player_ids.is_empty() {
            self.rooms.remove(&code);
            return Some(false);
        }

        if room.owner_id == player_id {
            room.owner_id = room.player_ids[0];
        }
        Some(true)
    }

    pub fn update_settings(
        &mut self,
        player_id: PlayerId,
        code: &str,
        update: &RoomSettingsUpdate,
    ) -> Result<&Room, RoomError> {
        let code = code.to_uppercase();
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;

        if room.owner_id != player_id {
            return Err(RoomError::NotOwner);
        }
        if !matches!(room.phase, RoomPhase::Waiting) {
            return Err(RoomError::NotWaiting);
        }

        let next = room.settings.apply_update(update);
        if (next.max_players as usize) < room.player_ids.len() {
            return Err(RoomError::TooSmall);
        }
        room.settings = next;
        Ok(room)
    }

    pub fn remove_room(&mut self, code: &str) {
        self.rooms.remove(&code.to_uppercase());
    }

    /// Handles a mid-game departure: splices the player out and, if they were
    /// the current drawer, signals the caller to end the round immediately.
    /// Collapses `drawer_index` so rotation continues correctly (see DESIGN.md).
    pub fn remove_mid_game(&mut self, player_id: PlayerId, code: &str) -> Option<MidGameLeave> {
        let code = code.to_uppercase();
        let room = self.rooms.get_mut(&code)?;

        let leaving_index = room.player_ids.iter().position(|id| *id == player_id)?;
        let was_drawer = room
            .game()
            .map(|g| g.drawer_id == player_id)
            .unwrap_or(false);

        room.player_ids.remove(leaving_index);
        if room.owner_id == player_id && !room.player_ids.is_empty() {
            room.owner_id = room.player_ids[0];
        }

        if let Some(game) = room.game_mut() {
            if leaving_index < game.drawer_index
                || (leaving_index == game.drawer_index && !was_drawer)
            {
                game.drawer_index = game.drawer_index.saturating_sub(1);
            }
            game.guessed_players.remove(&player_id);
            game.drawer_index = game.drawer_index.min(room.player_ids.len().saturating_sub(1));
        }

        Some(MidGameLeave {
            was_drawer,
            room_empty: room.player_ids.is_empty(),
            remaining_players: room.player_ids.len(),
        })
    }
}

pub struct MidGameLeave {
    pub was_drawer: bool,
    pub room_empty: bool,
    pub remaining_players: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_mints_six_char_uppercase_code() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let room = registry.create(owner, None).unwrap();
        assert_eq!(room.code.len(), 6);
        assert!(room.code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(room.player_ids, vec![owner]);
    }

    #[test]
    fn join_rejects_full_room() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let update = RoomSettingsUpdate {
            max_players: Some(2),
            ..Default::default()
        };
        let code = registry.create(owner, Some(update)).unwrap().code.clone();

        registry.join(PlayerId::new_v4(), &code).unwrap();
        let err = registry.join(PlayerId::new_v4(), &code).unwrap_err();
        assert_eq!(err, RoomError::Full);
    }

    #[test]
    fn join_is_case_insensitive_and_rejects_duplicate() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let code = registry.create(owner, None).unwrap().code.clone();
        let joiner = PlayerId::new_v4();

        registry.join(joiner, &code.to_lowercase()).unwrap();
        let err = registry.join(joiner, &code).unwrap_err();
        assert_eq!(err, RoomError::Duplicate);
    }

    #[test]
    fn leave_promotes_next_owner_and_deletes_when_empty() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let code = registry.create(owner, None).unwrap().code.clone();
        let second = PlayerId::new_v4();
        registry.join(second, &code).unwrap();

        assert_eq!(registry.leave(owner, &code), Some(true));
        assert_eq!(registry.get(&code).unwrap().owner_id, second);

        assert_eq!(registry.leave(second, &code), Some(false));
        assert!(registry.get(&code).is_none());
    }

    #[test]
    fn update_settings_rejects_shrinking_below_membership() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let code = registry.create(owner, None).unwrap().code.clone();
        registry.join(PlayerId::new_v4(), &code).unwrap();
        registry.join(PlayerId::new_v4(), &code).unwrap();

        let update = RoomSettingsUpdate {
            max_players: Some(2),
            ..Default::default()
        };
        let err = registry
            .update_settings(owner, &code, &update)
            .unwrap_err();
        assert_eq!(err, RoomError::TooSmall);
    }

    #[test]
    fn update_settings_rejects_non_owner() {
        let mut registry = RoomRegistry::new();
        let owner = PlayerId::new_v4();
        let code = registry.create(owner, None).unwrap().code.clone();
        let other = PlayerId::new_v4();
        registry.join(other, &code).unwrap();

        let err = registry
            .update_settings(other, &code, &RoomSettingsUpdate::default())
            .unwrap_err();
        assert_eq!(err, RoomError::NotOwner);
    }
}
