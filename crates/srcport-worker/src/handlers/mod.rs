//! HTTP surface of the worker service

mod heartbeat;
mod middleware;
mod types;

pub use heartbeat::configure_routes;
pub use middleware::require_worker_auth;
pub use types::AppState;

use axum::Router;
use std::sync::Arc;

/// Routes with worker authentication applied, ready to serve.
pub fn build_router(state: Arc<AppState>) -> Router {
    configure_routes()
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_worker_auth,
        ))
        .with_state(state)
}
