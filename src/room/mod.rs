use crate::chat::{ChatSource, Normalizer};
use crate::config::ChatConfig;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

mod bridge;

pub use bridge::{Bridge, BridgeOptions, RoomEvent};

/// Identifies one viewer connection
pub type SubscriberId = Uuid;

/// Registry shared between all viewer connections
pub type SharedRoomRegistry = Arc<RoomRegistry>;

type RoomReceiver = broadcast::Receiver<RoomEvent>;

/// Outcome of a bridge connect; `None` while still connecting
type ConnectOutcome = Option<Result<(), String>>;

struct Room {
    bridge: Bridge,
    subscribers: HashSet<SubscriberId>,
    events: broadcast::Sender<RoomEvent>,
}

/// Snapshot of one live room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub room_id: String,
    pub subscribers: usize,
    pub started_at: DateTime<Utc>,
    pub faulted: bool,
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<String, Room>,
    /// Rooms whose bridge is being started; later joiners wait on these
    connecting: HashMap<String, watch::Receiver<ConnectOutcome>>,
    memberships: HashMap<SubscriberId, String>,
}

impl RegistryState {
    fn leave(&mut self, subscriber: SubscriberId) -> bool {
        let Some(room_id) = self.memberships.remove(&subscriber) else {
            return false;
        };

        let now_empty = match self.rooms.get_mut(&room_id) {
            Some(room) => {
                room.subscribers.remove(&subscriber);
                room.subscribers.is_empty()
            }
            None => false,
        };

        info!(room_id = %room_id, subscriber = %subscriber, "Subscriber left room");

        if now_empty {
            if let Some(room) = self.rooms.remove(&room_id) {
                room.bridge.stop();
                info!(room_id = %room_id, "Room closed");
            }
        }

        true
    }

    /// Moves `subscriber` out of any room other than `room_id`
    fn leave_other(&mut self, subscriber: SubscriberId, room_id: &str) {
        if self
            .memberships
            .get(&subscriber)
            .map_or(false, |current| current != room_id)
        {
            self.leave(subscriber);
        }
    }

    fn subscribe(&mut self, subscriber: SubscriberId, room_id: &str) -> Option<RoomReceiver> {
        let room = self.rooms.get_mut(room_id)?;
        if room.subscribers.insert(subscriber) {
            info!(
                room_id = %room_id,
                subscriber = %subscriber,
                subscribers = room.subscribers.len(),
                "Subscriber joined room"
            );
        }
        self.memberships.insert(subscriber, room_id.to_string());
        Some(room.events.subscribe())
    }
}

/// What a join has to do after inspecting the registry
enum JoinStep {
    Joined(RoomReceiver),
    Wait(watch::Receiver<ConnectOutcome>),
    Connect {
        events: broadcast::Sender<RoomEvent>,
        done: watch::Sender<ConnectOutcome>,
    },
}

/// Maps room ids to their bridge and subscriber set.
///
/// A room exists exactly while it has at least one subscriber, and owns
/// exactly one bridge for that whole time. The lock only guards bookkeeping:
/// upstream connects run outside it, so a slow room never stalls the others.
pub struct RoomRegistry {
    source: Arc<dyn ChatSource>,
    normalizer: Normalizer,
    options: BridgeOptions,
    room_buffer: usize,
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    pub fn new(
        source: Arc<dyn ChatSource>,
        normalizer: Normalizer,
        options: BridgeOptions,
        room_buffer: usize,
    ) -> Self {
        Self {
            source,
            normalizer,
            options,
            room_buffer: room_buffer.max(1),
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn from_config(source: Arc<dyn ChatSource>, config: &ChatConfig) -> Self {
        Self::new(
            source,
            Normalizer::new(config.emote_cdn_host.clone()),
            config.bridge_options(),
            config.room_buffer,
        )
    }

    pub fn shared(self) -> SharedRoomRegistry {
        Arc::new(self)
    }

    /// Adds `subscriber` to `room_id`, creating the room and its bridge if needed.
    ///
    /// Returns `Ok(None)` when the room id is empty (no-op). Returns the room's
    /// event receiver otherwise. A subscriber belongs to at most one room, so
    /// joining a different room leaves the current one first. Bridge connect
    /// failure is returned and no room is created; joiners that were waiting
    /// on the same connect get the same error.
    pub async fn join(
        &self,
        subscriber: SubscriberId,
        room_id: &str,
    ) -> Result<Option<RoomReceiver>> {
        let Some(room_id) = normalize_room_id(room_id) else {
            return Ok(None);
        };

        loop {
            match self.plan_join(subscriber, &room_id).await {
                JoinStep::Joined(rx) => return Ok(Some(rx)),
                JoinStep::Wait(mut pending) => {
                    debug!(
                        room_id = %room_id,
                        subscriber = %subscriber,
                        "Waiting for room to connect"
                    );
                    let outcome = pending
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| (*outcome).clone());
                    if let Ok(Some(Err(reason))) = outcome {
                        return Err(anyhow!(reason));
                    }
                    // Connected, or the connecting join was cancelled: look again
                }
                JoinStep::Connect { events, done } => {
                    return self.connect(subscriber, &room_id, events, done).await;
                }
            }
        }
    }

    async fn plan_join(&self, subscriber: SubscriberId, room_id: &str) -> JoinStep {
        let mut state = self.state.lock().await;
        state.leave_other(subscriber, room_id);

        // A dropped sender with no outcome means that join was cancelled
        let stale = match state.connecting.get(room_id) {
            Some(pending) if pending.has_changed().is_ok() || pending.borrow().is_some() => {
                return JoinStep::Wait(pending.clone());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            state.connecting.remove(room_id);
        }

        let live = state
            .rooms
            .get(room_id)
            .map_or(false, |room| !room.bridge.is_faulted());
        if live {
            if let Some(rx) = state.subscribe(subscriber, room_id) {
                return JoinStep::Joined(rx);
            }
        }

        let events = match state.rooms.get(room_id) {
            Some(room) => {
                info!(room_id = %room_id, "Replacing faulted chat bridge");
                room.events.clone()
            }
            None => broadcast::channel(self.room_buffer).0,
        };

        let (done, pending) = watch::channel(None);
        state.connecting.insert(room_id.to_string(), pending);
        JoinStep::Connect { events, done }
    }

    /// Starts the bridge with the registry unlocked, then installs it
    async fn connect(
        &self,
        subscriber: SubscriberId,
        room_id: &str,
        events: broadcast::Sender<RoomEvent>,
        done: watch::Sender<ConnectOutcome>,
    ) -> Result<Option<RoomReceiver>> {
        let started = Bridge::start(
            room_id.to_string(),
            Arc::clone(&self.source),
            self.normalizer.clone(),
            events.clone(),
            self.options.clone(),
        )
        .await;

        let mut state = self.state.lock().await;
        state.connecting.remove(room_id);

        let bridge = match started {
            Ok(bridge) => bridge,
            Err(e) => {
                let _ = done.send(Some(Err(format!("{:#}", e))));
                return Err(e);
            }
        };

        state.leave_other(subscriber, room_id);
        match state.rooms.get_mut(room_id) {
            Some(room) => std::mem::replace(&mut room.bridge, bridge).stop(),
            None => {
                state.rooms.insert(
                    room_id.to_string(),
                    Room {
                        bridge,
                        subscribers: HashSet::new(),
                        events,
                    },
                );
                info!(room_id = %room_id, subscriber = %subscriber, "Room created");
            }
        }

        let rx = state.subscribe(subscriber, room_id);
        let _ = done.send(Some(Ok(())));
        Ok(rx)
    }

    /// Removes `subscriber` from its room; closes the room when it empties.
    ///
    /// Returns false if the subscriber was not registered.
    pub async fn leave(&self, subscriber: SubscriberId) -> bool {
        self.state.lock().await.leave(subscriber)
    }

    pub async fn contains_room(&self, room_id: &str) -> bool {
        let Some(id) = normalize_room_id(room_id) else {
            return false;
        };
        self.state.lock().await.rooms.contains_key(&id)
    }

    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        let Some(id) = normalize_room_id(room_id) else {
            return 0;
        };
        self.state
            .lock()
            .await
            .rooms
            .get(&id)
            .map_or(0, |room| room.subscribers.len())
    }

    /// Room the subscriber currently belongs to
    pub async fn room_of(&self, subscriber: SubscriberId) -> Option<String> {
        self.state.lock().await.memberships.get(&subscriber).cloned()
    }

    /// Status of every live room, sorted by room id
    pub async fn statuses(&self) -> Vec<RoomStatus> {
        let state = self.state.lock().await;
        let mut statuses: Vec<RoomStatus> = state
            .rooms
            .iter()
            .map(|(id, room)| RoomStatus {
                room_id: id.clone(),
                subscribers: room.subscribers.len(),
                started_at: room.bridge.started_at(),
                faulted: room.bridge.is_faulted(),
            })
            .collect();
        statuses.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        statuses
    }
}

/// Trims, drops a leading `#` and lowercases; `None` when nothing is left
pub fn normalize_room_id(room_id: &str) -> Option<String> {
    let id = room_id.trim().trim_start_matches('#').trim().to_lowercase();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
