use crate::chat::Message;
use serde::{Deserialize, Serialize};

/// Client → Server message types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room; a missing or empty `roomId` is ignored
    #[serde(rename = "initialize")]
    Initialize {
        #[serde(rename = "roomId", default)]
        room_id: Option<String>,
    },
    #[serde(rename = "leave")]
    Leave,
}

/// Server → Client: chat message fan-out
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub message: Message,
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        Self {
            msg_type: "message".to_string(),
            message,
        }
    }
}

/// Server → Client: Error message
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: String) -> Self {
        Self {
            msg_type: "error".to_string(),
            error,
        }
    }
}
