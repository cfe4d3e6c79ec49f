use crate::room::{RoomStatus, SharedRoomRegistry};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

/// Shared state for the room status API
pub struct RoomsAppState {
    pub registry: SharedRoomRegistry,
}

/// Create room status router
pub fn create_rooms_router(state: Arc<RoomsAppState>) -> Router {
    Router::new()
        .route("/api/rooms", get(list_rooms))
        .with_state(state)
}

/// GET /api/rooms - Live rooms with subscriber counts, sorted by room id
async fn list_rooms(State(state): State<Arc<RoomsAppState>>) -> Json<Vec<RoomStatus>> {
    Json(state.registry.statuses().await)
}
