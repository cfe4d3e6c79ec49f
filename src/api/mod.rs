// HTTP and WebSocket APIs

pub mod rooms;
pub mod websocket;

pub use rooms::{create_rooms_router, RoomsAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::room::SharedRoomRegistry;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Full application router: viewer socket plus room status, CORS open
pub fn create_app(registry: SharedRoomRegistry) -> Router {
    let ws_state = Arc::new(WsAppState {
        registry: Arc::clone(&registry),
    });
    let rooms_state = Arc::new(RoomsAppState { registry });

    Router::new()
        .merge(create_ws_router(ws_state))
        .merge(create_rooms_router(rooms_state))
        .layer(CorsLayer::permissive())
}
