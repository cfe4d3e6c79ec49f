use crate::chat::{ChatConnection, ChatSource, Message, Normalizer, RawChatEvent};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event delivered to every subscriber of a room
#[derive(Clone, Debug, PartialEq)]
pub enum RoomEvent {
    /// A normalized chat message
    Message(Message),
    /// The upstream connection is gone and could not be restored
    Fault { reason: String },
}

/// Connection behavior shared by all bridges of a registry
#[derive(Clone, Debug)]
pub struct BridgeOptions {
    /// Upper bound for the initial connect
    pub connect_timeout: Duration,
    /// Sleep before each reconnect attempt after a mid-session drop
    pub reconnect_delays: Vec<Duration>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }
}

/// Bridge owns the single upstream chat connection of one room.
///
/// The connection runs in its own task so a slow upstream never stalls other
/// rooms. Dropping the bridge aborts that task, so a bridge cannot outlive the
/// room entry that owns it.
pub struct Bridge {
    room_id: String,
    started_at: DateTime<Utc>,
    faulted: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Bridge {
    /// Connects to `room_id` and starts forwarding normalized messages.
    ///
    /// Returns once the upstream connection is established. Connect failure
    /// or timeout is returned to the caller and nothing keeps running.
    pub async fn start(
        room_id: String,
        source: Arc<dyn ChatSource>,
        normalizer: Normalizer,
        events: broadcast::Sender<RoomEvent>,
        options: BridgeOptions,
    ) -> Result<Self> {
        info!(room_id = %room_id, source = %source.name(), "Starting chat bridge");

        let faulted = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = BridgeTask {
            room_id: room_id.clone(),
            source,
            normalizer,
            events,
            reconnect_delays: options.reconnect_delays,
            faulted: Arc::clone(&faulted),
        };
        let handle = tokio::spawn(task.run(ready_tx));

        // Constructed before awaiting so every early return aborts the task
        let bridge = Self {
            room_id,
            started_at: Utc::now(),
            faulted,
            task: handle,
        };

        match tokio::time::timeout(options.connect_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(bridge),
            Ok(Ok(Err(e))) => Err(e.context(format!(
                "Failed to connect chat bridge for room '{}'",
                bridge.room_id
            ))),
            Ok(Err(_)) => Err(anyhow!(
                "Chat bridge for room '{}' ended before connecting",
                bridge.room_id
            )),
            Err(_) => Err(anyhow!(
                "Timed out after {:?} connecting chat bridge for room '{}'",
                options.connect_timeout,
                bridge.room_id
            )),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// True once reconnection was given up and a fault was broadcast
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// Disconnects from the upstream. Safe while a connect is still pending.
    pub fn stop(self) {
        self.task.abort();
        info!(room_id = %self.room_id, "Chat bridge stopped");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct BridgeTask {
    room_id: String,
    source: Arc<dyn ChatSource>,
    normalizer: Normalizer,
    events: broadcast::Sender<RoomEvent>,
    reconnect_delays: Vec<Duration>,
    faulted: Arc<AtomicBool>,
}

impl BridgeTask {
    async fn run(self, ready: oneshot::Sender<Result<()>>) {
        let mut conn = match self.source.connect(&self.room_id).await {
            Ok(conn) => {
                let _ = ready.send(Ok(()));
                conn
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        loop {
            self.pump(conn.as_mut()).await;

            match self.reconnect().await {
                Some(next) => conn = next,
                None => {
                    self.faulted.store(true, Ordering::SeqCst);
                    let reason = format!(
                        "Lost connection to chat for room '{}' after {} reconnect attempts",
                        self.room_id,
                        self.reconnect_delays.len()
                    );
                    error!(room_id = %self.room_id, "Chat bridge faulted");
                    let _ = self.events.send(RoomEvent::Fault { reason });
                    return;
                }
            }
        }
    }

    /// Forwards events until the connection closes or fails
    async fn pump(&self, conn: &mut dyn ChatConnection) {
        loop {
            match conn.next_event().await {
                Ok(Some(raw)) => self.forward(raw),
                Ok(None) => {
                    warn!(room_id = %self.room_id, "Chat connection closed by upstream");
                    return;
                }
                Err(e) => {
                    warn!(room_id = %self.room_id, error = %e, "Chat connection failed");
                    return;
                }
            }
        }
    }

    fn forward(&self, raw: RawChatEvent) {
        match self.normalizer.normalize(raw) {
            Ok(message) => {
                if self.events.send(RoomEvent::Message(message)).is_err() {
                    debug!(room_id = %self.room_id, "No subscribers for chat message");
                }
            }
            Err(e) => {
                warn!(room_id = %self.room_id, error = %e, "Dropping malformed chat event");
            }
        }
    }

    async fn reconnect(&self) -> Option<Box<dyn ChatConnection>> {
        for (attempt, delay) in self.reconnect_delays.iter().enumerate() {
            debug!(
                room_id = %self.room_id,
                delay_ms = delay.as_millis() as u64,
                "Backing off before reconnect"
            );
            tokio::time::sleep(*delay).await;

            match self.source.connect(&self.room_id).await {
                Ok(conn) => {
                    info!(room_id = %self.room_id, attempt = attempt + 1, "Chat bridge reconnected");
                    return Some(conn);
                }
                Err(e) => {
                    warn!(
                        room_id = %self.room_id,
                        attempt = attempt + 1,
                        max_attempts = self.reconnect_delays.len(),
                        error = %e,
                        "Reconnect failed"
                    );
                }
            }
        }
        None
    }
}
