// Chat model, normalization and upstream chat sources
pub mod chat;

// Room registry and chat bridges
pub mod room;

// Viewer connections and wire protocol
pub mod subscription;

// HTTP and WebSocket APIs
pub mod api;

// Entity simulation and frame scheduling
pub mod world;

// Configuration
pub mod config;

pub use chat::Message;
