use axum::{extract::State, http::StatusCode, routing::post, Extension, Router};
use srcport_core::{error_builder, problemdetails::Problem, AuthenticatedIdentity, ServiceError};
use std::sync::Arc;
use tracing::error;

use super::AppState;

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new().route("/workers/ping", post(worker_ping))
}

/// Record a liveness check-in for the calling worker
async fn worker_ping(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<StatusCode, Problem> {
    let worker = match app_state.worker_registry.resolve_identity(&identity).await {
        Ok(worker) => worker,
        Err(ServiceError::AuthFailure(_)) => return Err(error_builder::unauthorized().build()),
        Err(e) => {
            error!("failed to resolve worker {}: {}", identity.worker_id, e);
            return Err(update_failed());
        }
    };

    match app_state
        .worker_registry
        .set_worker_last_checkin_time(&worker.worker_id)
        .await
    {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("failed to update worker {}: {}", worker.worker_id, e);
            Err(update_failed())
        }
    }
}

fn update_failed() -> Problem {
    error_builder::internal_server_error()
        .detail("failed to update worker")
        .build()
}
