use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::Engine;
use srcport_core::{error_builder, problemdetails::Problem, ServiceError};
use std::sync::Arc;
use tracing::warn;

use super::AppState;

/// Split a `Basic base64(worker_id:secret)` header value.
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (worker_id, secret) = decoded.split_once(':')?;
    Some((worker_id.to_string(), secret.to_string()))
}

/// Validate worker credentials and attach the resulting
/// [`srcport_core::AuthenticatedIdentity`] to the request.
pub async fn require_worker_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Problem> {
    let credentials = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic_auth);

    let Some((worker_id, secret)) = credentials else {
        return Err(error_builder::unauthorized().build());
    };

    match state.worker_registry.authenticate(&worker_id, &secret).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Err(ServiceError::AuthFailure(_)) => Err(error_builder::unauthorized().build()),
        Err(e) => {
            warn!("failed to authenticate worker {}: {}", worker_id, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_auth() {
        // "test-worker:hunter2"
        let parsed = parse_basic_auth("Basic dGVzdC13b3JrZXI6aHVudGVyMg==");
        assert_eq!(
            parsed,
            Some(("test-worker".to_string(), "hunter2".to_string()))
        );

        assert_eq!(parse_basic_auth("Bearer dGVzdC13b3JrZXI6aHVudGVyMg=="), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
        // "nocolon"
        assert_eq!(parse_basic_auth("Basic bm9jb2xvbg=="), None);
    }
}
