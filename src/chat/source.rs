use super::RawChatEvent;
use anyhow::Result;
use async_trait::async_trait;

/// Upstream chat service that can be joined per room.
///
/// Implementations must not block: `connect` and `next_event` are awaited
/// from bridge tasks running alongside every other room.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Short identifier used in logs (e.g. "irc")
    fn name(&self) -> &str;

    /// Opens a connection to `room` and returns once it is receiving.
    ///
    /// Errors here are treated as a failed room creation by the caller.
    async fn connect(&self, room: &str) -> Result<Box<dyn ChatConnection>>;
}

/// A live connection to one room of a [`ChatSource`].
#[async_trait]
pub trait ChatConnection: Send {
    /// Waits for the next chat event.
    ///
    /// * `Ok(Some(event))` - a chat message arrived
    /// * `Ok(None)` - the upstream closed the connection
    /// * `Err(...)` - transport or protocol failure
    async fn next_event(&mut self) -> Result<Option<RawChatEvent>>;
}
