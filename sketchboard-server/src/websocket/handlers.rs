use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;
use uuid::Uuid;

use sketchboard_types::{ClientMessage, PlayerId, RoomError, ServerMessage};

use crate::room_actor::{AppState, RoomCommand};
use crate::websocket::connection::ConnectionId;

/// Dispatches inbound client messages, either directly against shared state
/// (player naming, room creation) or by forwarding a `RoomCommand` into the
/// addressed room's mailbox.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    state: Arc<AppState>,
}

impl MessageHandler {
    pub fn new(connection_id: ConnectionId, state: Arc<AppState>) -> Self {
        Self {
            connection_id,
            state,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.state.connections.update_activity(self.connection_id).await;

        match message {
            ClientMessage::SetPlayerName { name } => self.handle_set_player_name(name).await,
            ClientMessage::CreateRoom { settings } => self.handle_create_room(settings).await,
            ClientMessage::JoinRoom { room_id } => self.handle_join_room(room_id).await,
            ClientMessage::LeaveRoom => self.handle_leave_room().await,
            ClientMessage::UpdateRoomSettings { settings } => {
                self.forward(|player_id| RoomCommand::UpdateSettings {
                    player_id,
                    update: settings,
                })
                .await
            }
            ClientMessage::StartGame => {
                self.forward(|player_id| RoomCommand::StartGame {
                    player_id,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::SelectWord { word } => {
                self.forward(|player_id| RoomCommand::SelectWord { player_id, word })
                    .await
            }
            ClientMessage::DrawStart { payload } => {
                self.forward(|player_id| RoomCommand::DrawStart {
                    player_id,
                    payload,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::DrawMove { payload } => {
                self.forward(|player_id| RoomCommand::DrawMove {
                    player_id,
                    payload,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::DrawEnd { payload } => {
                self.forward(|player_id| RoomCommand::DrawEnd {
                    player_id,
                    payload,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::ClearCanvas => {
                self.forward(|player_id| RoomCommand::ClearCanvas {
                    player_id,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::Guess { guess } => {
                self.forward(|player_id| RoomCommand::Guess {
                    player_id,
                    guess,
                    now_ms: now_ms(),
                })
                .await
            }
            ClientMessage::PlayAgain => {
                self.forward(|player_id| RoomCommand::PlayAgain { player_id })
                    .await
            }
        }
    }

    pub async fn handle_disconnect(&self) {
        info!(connection = %self.connection_id, "handling disconnect");

        let Some(connection) = self.state.connections.get_connection(self.connection_id).await else {
            return;
        };
        let (Some(player_id), Some(room_code)) = (connection.player_id, connection.room_code) else {
            return;
        };

        if let Some(mailbox) = self.state.mailbox(&room_code).await {
            let _ = mailbox.send(RoomCommand::Disconnect { player_id }).await;
        }
    }

    async fn handle_set_player_name(&self, name: String) -> Result<(), String> {
        let player_id = self.current_or_new_player_id().await;
        let mut players = self.state.players.write().await;
        match players.set_name(player_id, &name) {
            Ok(name) => {
                drop(players);
                self.notify_room_of_rename(player_id).await;
                self.send_message(ServerMessage::PlayerUpdated { player_id, name })
                    .await
            }
            Err(err) => {
                drop(players);
                self.send_message(ServerMessage::GameError { error: err }).await
            }
        }
    }

    /// Best-effort: a rename while not in a room is a normal case, not an error.
    async fn notify_room_of_rename(&self, player_id: PlayerId) {
        let Some(connection) = self.state.connections.get_connection(self.connection_id).await else {
            return;
        };
        let Some(room_code) = connection.room_code else {
            return;
        };
        if let Some(mailbox) = self.state.mailbox(&room_code).await {
            let _ = mailbox.send(RoomCommand::PlayerRenamed { player_id }).await;
        }
    }

    async fn handle_create_room(
        &self,
        settings: Option<sketchboard_types::RoomSettingsUpdate>,
    ) -> Result<(), String> {
        let player_id = self.current_or_new_player_id().await;

        match self
            .state
            .create_room(self.connection_id, player_id, settings)
            .await
        {
            Ok(_code) => Ok(()),
            Err(err) => self.send_message(ServerMessage::RoomError { error: err }).await,
        }
    }

    async fn handle_join_room(&self, room_id: String) -> Result<(), String> {
        let player_id = self.current_or_new_player_id().await;
        self.join_mailbox(player_id, &room_id).await
    }

    async fn join_mailbox(&self, player_id: PlayerId, code: &str) -> Result<(), String> {
        let Some(mailbox) = self.state.mailbox(code).await else {
            return self
                .send_message(ServerMessage::RoomError {
                    error: RoomError::NotFound,
                })
                .await;
        };

        let (tx, rx) = tokio::sync::oneshot::channel();
        if mailbox
            .send(RoomCommand::Join {
                player_id,
                reply: tx,
            })
            .await
            .is_err()
        {
            return self
                .send_message(ServerMessage::RoomError {
                    error: RoomError::NotFound,
                })
                .await;
        }

        match rx.await {
            Ok(Ok(room)) => {
                self.state
                    .connections
                    .set_room(self.connection_id, Some(code.to_string()))
                    .await;
                let mut players = self.state.players.write().await;
                players.set_room(player_id, Some(code.to_string()));
                drop(players);
                self.send_message(ServerMessage::RoomJoined { room }).await
            }
            Ok(Err(err)) => self.send_message(ServerMessage::RoomError { error: err }).await,
            Err(_) => {
                self.send_message(ServerMessage::RoomError {
                    error: RoomError::NotFound,
                })
                .await
            }
        }
    }

    async fn handle_leave_room(&self) -> Result<(), String> {
        let result = self
            .forward(|player_id| RoomCommand::Leave { player_id })
            .await;
        self.state.connections.set_room(self.connection_id, None).await;
        self.send_message(ServerMessage::RoomLeft).await?;
        result
    }

    /// Looks up the caller's room from the connection table and forwards a
    /// command built from their player id, or replies with an error if they
    /// are not currently in a room.
    async fn forward<F>(&self, build: F) -> Result<(), String>
    where
        F: FnOnce(PlayerId) -> RoomCommand,
    {
        let Some(connection) = self.state.connections.get_connection(self.connection_id).await else {
            return Err("connection not found".to_string());
        };
        let (Some(player_id), Some(room_code)) = (connection.player_id, connection.room_code) else {
            return self
                .send_message(ServerMessage::GameError {
                    error: RoomError::NotFound,
                })
                .await;
        };

        match self.state.mailbox(&room_code).await {
            Some(mailbox) => {
                let _ = mailbox.send(build(player_id)).await;
                Ok(())
            }
            None => {
                self.send_message(ServerMessage::GameError {
                    error: RoomError::NotFound,
                })
                .await
            }
        }
    }

    async fn current_or_new_player_id(&self) -> PlayerId {
        if let Some(connection) = self.state.connections.get_connection(self.connection_id).await {
            if let Some(player_id) = connection.player_id {
                return player_id;
            }
        }

        let player_id = Uuid::new_v4();
        self.state
            .connections
            .bind_player(self.connection_id, player_id)
            .await;
        let mut players = self.state.players.write().await;
        players.create(self.connection_id.to_string(), player_id);
        drop(players);
        let _ = self
            .send_message(ServerMessage::Connected { player_id })
            .await;
        player_id
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.state
            .connections
            .send_to_connection(self.connection_id, message)
            .await
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
