use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use sketchboard_types::{PlayerId, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub player_id: Option<PlayerId>,
    pub room_code: Option<String>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            player_id: None,
            room_code: None,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn set_player(&mut self, player_id: PlayerId) {
        self.player_id = Some(player_id);
    }

    pub fn set_room(&mut self, room_code: Option<String>) {
        self.room_code = room_code;
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Double-indexed connection table: by transport connection id and by the
/// player id it has claimed. No room index is kept here -- room fan-out goes
/// through `player_id`s a room actor already tracks in its membership list.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    player_to_connection: RwLock<HashMap<PlayerId, ConnectionId>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            player_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);
        let mut connections = self.connections.write().await;
        connections.insert(id, conn);
        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        let player_id = {
            let mut connections = self.connections.write().await;
            connections.remove(&id).and_then(|conn| conn.player_id)
        };

        if let Some(player_id) = player_id {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.remove(&player_id);
        }
    }

    pub async fn bind_player(&self, id: ConnectionId, player_id: PlayerId) {
        {
            let mut connections = self.connections.write().await;
            if let Some(conn) = connections.get_mut(&id) {
                conn.set_player(player_id);
            }
        }
        let mut player_to_connection = self.player_to_connection.write().await;
        player_to_connection.insert(player_id, id);
    }

    pub async fn set_room(&self, id: ConnectionId, room_code: Option<String>) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(&id) {
            conn.set_room(room_code);
        }
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(&id) {
            conn.update_activity();
        }
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn send_to_connection(&self, id: ConnectionId, message: ServerMessage) -> Result<(), String> {
        let connections = self.connections.read().await;
        match connections.get(&id) {
            Some(conn) => conn.send_message(message),
            None => Err("connection not found".to_string()),
        }
    }

    pub async fn send_to_player(&self, player_id: PlayerId, message: ServerMessage) {
        let connection_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_id).copied()
        };
        if let Some(id) = connection_id {
            let _ = self.send_to_connection(id, message).await;
        }
    }

    /// Broadcasts to every connection currently bound to `room_code`.
    pub async fn broadcast_to_room(&self, room_code: &str, message: ServerMessage) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            if conn.room_code.as_deref() == Some(room_code) {
                let _ = conn.send_message(message.clone());
            }
        }
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        let inactive: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        for id in &inactive {
            tracing::info!(connection = %id, "removing inactive connection");
            self.remove_connection(*id).await;
        }
        inactive
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn player_connection_count(&self) -> usize {
        self.player_to_connection.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_creation_and_removal() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let _receiver = manager.create_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 1);

        manager.remove_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn bind_player_then_remove_clears_both_indices() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();
        let player_id = PlayerId::new_v4();

        let _receiver = manager.create_connection(conn_id).await;
        manager.bind_player(conn_id, player_id).await;
        assert_eq!(manager.player_connection_count().await, 1);

        manager.remove_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 0);
        assert_eq!(manager.player_connection_count().await, 0);
    }

    #[tokio::test]
    async fn send_to_missing_connection_errors() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let result = manager
            .send_to_connection(conn_id, ServerMessage::RoomLeft)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_errors() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let receiver = manager.create_connection(conn_id).await;
        drop(receiver);

        let result = manager
            .send_to_connection(conn_id, ServerMessage::RoomLeft)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn broadcast_to_room_reaches_all_members() {
        let manager = ConnectionManager::new();
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();

        let mut rx_a = manager.create_connection(conn_a).await;
        let mut rx_b = manager.create_connection(conn_b).await;
        manager.set_room(conn_a, Some("ABC123".to_string())).await;
        manager.set_room(conn_b, Some("ABC123".to_string())).await;

        manager.broadcast_to_room("ABC123", ServerMessage::RoomLeft).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn cleanup_removes_only_inactive_connections() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();
        let _receiver = manager.create_connection(conn_id).await;

        let short_timeout = Duration::from_millis(10);
        manager.cleanup_inactive_connections(short_timeout).await;
        assert_eq!(manager.connection_count().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.cleanup_inactive_connections(short_timeout).await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_connect_and_remove_converges_to_zero() {
        let manager = std::sync::Arc::new(ConnectionManager::new());
        let mut handles = Vec::new();

        for _ in 0..50 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let conn_id = ConnectionId::new();
                let _receiver = manager.create_connection(conn_id).await;
                manager.bind_player(conn_id, PlayerId::new_v4()).await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                manager.remove_connection(conn_id).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.connection_count().await, 0);
        assert_eq!(manager.player_connection_count().await, 0);
    }
}
