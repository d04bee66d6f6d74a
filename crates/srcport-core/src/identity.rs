use serde::{Deserialize, Serialize};

/// A worker identity whose credentials were already validated by the
/// authentication middleware. Registry operations take it explicitly instead
/// of reading caller state from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub worker_id: String,
}

impl AuthenticatedIdentity {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
        }
    }
}
