// Viewer connections and wire protocol

pub mod manager;
pub mod protocol;

pub use manager::ConnectionManager;
pub use protocol::{ChatMessage, ClientMessage, ErrorMessage};
