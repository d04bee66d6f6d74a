//! Configuration shared by the worker server and the CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_WEB_URL: &str = "https://github.com";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
        }
    }
}

/// Which forge backend imports are pushed to
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForgeSettings {
    #[serde(rename = "github")]
    GitHub {
        organization: String,
        app_id: String,
        /// PEM-encoded RSA private key of the GitHub App
        private_key_pem: String,
        make_repos_public: bool,
        api_url: String,
        web_url: String,
    },
    /// In-process forge; only useful for local runs and tests
    Memory { remote_url: String },
}

impl std::fmt::Debug for ForgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForgeSettings::GitHub {
                organization,
                app_id,
                make_repos_public,
                api_url,
                web_url,
                ..
            } => f
                .debug_struct("GitHub")
                .field("organization", organization)
                .field("app_id", app_id)
                .field("private_key_pem", &"<redacted>")
                .field("make_repos_public", make_repos_public)
                .field("api_url", api_url)
                .field("web_url", web_url)
                .finish(),
            ForgeSettings::Memory { remote_url } => f
                .debug_struct("Memory")
                .field("remote_url", remote_url)
                .finish(),
        }
    }
}

/// Heartbeat server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    /// Address the heartbeat server binds to, e.g. `0.0.0.0:8080`
    pub listen_address: String,
}

/// What the import activities run against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub database: DatabaseConfig,
    pub forge: ForgeSettings,
    /// Per-request timeout for remote artifact downloads
    pub fetch_timeout_secs: u64,
    /// Armored OpenPGP key files; packages must be signed by one of their keys
    pub trusted_key_files: Vec<PathBuf>,
}
