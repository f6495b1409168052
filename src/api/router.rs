use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

use super::handlers::{self, AppState};

/// Routes keep the paths existing booking clients call.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/get_bookings", get(handlers::list_bookings))
        .route("/book", post(handlers::book))
        .route("/cancel/{id}", delete(handlers::cancel))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { engine })
}
