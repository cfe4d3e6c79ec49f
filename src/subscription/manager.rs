use crate::room::{RoomEvent, SharedRoomRegistry, SubscriberId};
use crate::subscription::protocol::{ChatMessage, ClientMessage, ErrorMessage};
use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

type RoomReceiver = broadcast::Receiver<RoomEvent>;

/// Manages a single viewer WebSocket connection and its room membership
pub struct ConnectionManager {
    id: SubscriberId,
    registry: SharedRoomRegistry,
}

/// What a handled client message does to the room subscription
enum RoomChange {
    Keep,
    Set(RoomReceiver),
    Clear,
}

impl ConnectionManager {
    pub fn new(registry: SharedRoomRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
        }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(self, mut socket: WebSocket) {
        info!(subscriber = %self.id, "WebSocket connection established");

        let mut room_rx: Option<RoomReceiver> = None;

        loop {
            tokio::select! {
                // Handle incoming client messages
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match self.handle_client_message(&mut socket, &text).await {
                                RoomChange::Keep => {}
                                RoomChange::Set(rx) => room_rx = Some(rx),
                                RoomChange::Clear => room_rx = None,
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(subscriber = %self.id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Handle events from the joined room
                result = recv_room(&mut room_rx) => {
                    match result {
                        Ok(RoomEvent::Message(message)) => {
                            if let Err(e) = send_json(&mut socket, &ChatMessage::from(message)).await {
                                error!(error = %e, "Failed to send chat message");
                                break;
                            }
                        }
                        Ok(RoomEvent::Fault { reason }) => {
                            if let Err(e) = send_json(&mut socket, &ErrorMessage::new(reason)).await {
                                error!(error = %e, "Failed to send room fault");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(subscriber = %self.id, skipped = skipped, "Viewer lagged, skipped messages");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            room_rx = None;
                        }
                    }
                }
            }
        }

        self.registry.leave(self.id).await;
        info!(subscriber = %self.id, "WebSocket connection closed");
    }

    /// Handle client message (initialize/leave)
    async fn handle_client_message(&self, socket: &mut WebSocket, text: &str) -> RoomChange {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(subscriber = %self.id, error = %e, "Ignoring malformed client message");
                return RoomChange::Keep;
            }
        };

        match msg {
            ClientMessage::Initialize { room_id } => {
                let room_id = room_id.unwrap_or_default();
                match self.registry.join(self.id, &room_id).await {
                    Ok(Some(rx)) => RoomChange::Set(rx),
                    Ok(None) => RoomChange::Keep,
                    Err(e) => {
                        error!(
                            subscriber = %self.id,
                            room_id = %room_id,
                            error = %e,
                            "Failed to join room"
                        );
                        let still_member = self.registry.room_of(self.id).await.is_some();

                        let reply = ErrorMessage::new(format!("{:#}", e));
                        if let Err(e) = send_json(socket, &reply).await {
                            error!(error = %e, "Failed to send join error");
                        }
                        if still_member {
                            RoomChange::Keep
                        } else {
                            RoomChange::Clear
                        }
                    }
                }
            }
            ClientMessage::Leave => {
                self.registry.leave(self.id).await;
                RoomChange::Clear
            }
        }
    }
}

/// Waits for the next room event; pends forever while not in a room
async fn recv_room(rx: &mut Option<RoomReceiver>) -> Result<RoomEvent, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, payload: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(payload)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
