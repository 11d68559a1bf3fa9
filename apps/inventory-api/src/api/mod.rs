pub mod health;

use axum::{Router, routing::get};

/// `/ready` with a real database check, state already applied so it merges
/// into the stateless app router.
pub fn ready_router(state: crate::state::AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
