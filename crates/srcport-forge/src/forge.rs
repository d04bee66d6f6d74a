use async_trait::async_trait;
use chrono::{Duration, Utc};
use srcport_core::UtcDateTime;
use std::fmt;

use crate::ForgeError;

/// Upper bound, in minutes, on how long an [`Authenticator`] is considered valid
pub const AUTHENTICATOR_LIFETIME_MINUTES: i64 = 45;

pub fn authenticator_lifetime() -> Duration {
    Duration::minutes(AUTHENTICATOR_LIFETIME_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeKind {
    GitHub,
    Memory,
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeKind::GitHub => write!(f, "github"),
            ForgeKind::Memory => write!(f, "memory"),
        }
    }
}

/// How git transports authenticate against the forge
#[derive(Clone, PartialEq, Eq)]
pub enum TransportCredential {
    BasicAuth { username: String, password: String },
    Bearer { token: String },
}

impl TransportCredential {
    /// The token the forge API accepts as a bearer credential.
    /// For basic auth this is the password.
    pub fn bearer_token(&self) -> &str {
        match self {
            TransportCredential::BasicAuth { password, .. } => password,
            TransportCredential::Bearer { token } => token,
        }
    }
}

impl fmt::Debug for TransportCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCredential::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            TransportCredential::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Push credential plus the identity commits are authored as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticator {
    pub credential: TransportCredential,
    pub author_name: String,
    pub author_email: String,
    pub expires_at: UtcDateTime,
}

impl Authenticator {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait Forge: Send + Sync {
    fn kind(&self) -> ForgeKind;

    /// Mint a fresh credential and author identity.
    async fn get_authenticator(&self) -> Result<Authenticator, ForgeError>;

    /// Base URL repositories of the managed organization live under
    fn get_remote(&self) -> String;

    /// Create `repo` unless it already exists. Calling this repeatedly is safe.
    async fn ensure_repository_exists(
        &self,
        auth: &Authenticator,
        repo: &str,
    ) -> Result<(), ForgeError>;
}
