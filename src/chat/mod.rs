use serde::{Deserialize, Serialize};

pub mod irc;
mod normalize;
mod source;

pub use irc::{IrcChatSource, IrcConfig};
pub use normalize::{emote_url, NormalizeError, Normalizer};
pub use source::{ChatConnection, ChatSource};

/// Message is the canonical chat record fanned out to every viewer of a room.
///
/// Field names on the wire follow the viewer protocol:
/// `{ name, userId, message, color, emotes }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Display name shown above the entity
    #[serde(rename = "name")]
    pub display_name: String,

    /// Identity key; one entity per user id
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Emote-stripped, whitespace-collapsed text
    #[serde(rename = "message")]
    pub text: String,

    /// Color assigned by the chat service (nullable)
    pub color: Option<String>,

    /// Emote image URLs in emote-id order
    pub emotes: Vec<String>,
}

/// Raw chat event as delivered by an upstream chat source.
///
/// Nothing here is trusted; the [`Normalizer`] validates it before a
/// [`Message`] is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawChatEvent {
    /// Message text exactly as sent
    pub text: String,

    /// `display-name` tag
    pub display_name: Option<String>,

    /// Login name from the message prefix (display name fallback)
    pub login: Option<String>,

    /// `user-id` tag
    pub user_id: Option<String>,

    /// `color` tag
    pub color: Option<String>,

    /// Emote id -> list of `"start-end"` ranges, in tag order
    pub emotes: Vec<(String, Vec<String>)>,
}
