use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use sketchboard_types::ClientMessage;

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

use crate::room_actor::AppState;

pub async fn handle_connection(websocket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    info!(connection = %connection_id, "new websocket connection");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let rate_limiter = RateLimiter::new();

    let message_receiver = state.connections.create_connection(connection_id).await;
    let message_handler = MessageHandler::new(connection_id, state.clone());

    let incoming_handler = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = rate_limiter.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_message(msg, &mut rate_limiter, &message_handler, connection_id).await
                        {
                            error!(connection = %connection_id, error = %e, "error handling message");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection = %connection_id, error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    };

    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "failed to serialize outbound message");
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!(connection = %connection_id, error = %e, "failed to send message");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!(connection = %connection_id, "connection disconnected");
    message_handler.handle_disconnect().await;
    state.connections.remove_connection(connection_id).await;
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !rate_limiter.check_rate_limit().await {
        warn!(connection = %connection_id, "rate limit exceeded");
        return Err("rate limit exceeded".into());
    }

    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "invalid text message")?;

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(connection = %connection_id, error = %e, "dropping malformed client payload");
            return Ok(());
        }
    };

    message_handler
        .handle_message(client_message)
        .await
        .map_err(|e| format!("message handling error: {e}"))?;

    Ok(())
}
