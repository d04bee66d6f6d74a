use srcport_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("{endpoint} returned unexpected status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<ForgeError> for ServiceError {
    fn from(error: ForgeError) -> Self {
        ServiceError::ForgeApiFailure(error.to_string())
    }
}
