//! In-process forge that records repository provisioning

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::forge::authenticator_lifetime;
use crate::{Authenticator, Forge, ForgeError, ForgeKind, TransportCredential};

pub struct InMemoryForge {
    remote_url: String,
    repositories: Mutex<BTreeSet<String>>,
    creations: AtomicUsize,
    tokens_minted: AtomicUsize,
}

impl InMemoryForge {
    pub fn new(remote_url: &str) -> Self {
        Self {
            remote_url: remote_url.trim_end_matches('/').to_string(),
            repositories: Mutex::new(BTreeSet::new()),
            creations: AtomicUsize::new(0),
            tokens_minted: AtomicUsize::new(0),
        }
    }

    fn repos(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.repositories
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Names of all repositories created so far, sorted
    pub fn repositories(&self) -> Vec<String> {
        self.repos().iter().cloned().collect()
    }

    /// Number of times a repository was actually created
    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forge for InMemoryForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::Memory
    }

    async fn get_authenticator(&self) -> Result<Authenticator, ForgeError> {
        let n = self.tokens_minted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Authenticator {
            credential: TransportCredential::Bearer {
                token: format!("memory-token-{}", n),
            },
            author_name: "srcport[bot]".to_string(),
            author_email: "srcport[bot]@users.noreply.localhost".to_string(),
            expires_at: Utc::now() + authenticator_lifetime(),
        })
    }

    fn get_remote(&self) -> String {
        self.remote_url.clone()
    }

    async fn ensure_repository_exists(
        &self,
        _auth: &Authenticator,
        repo: &str,
    ) -> Result<(), ForgeError> {
        if self.repos().insert(repo.to_string()) {
            self.creations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_repository_exists_creates_once() {
        let forge = InMemoryForge::new("https://forge.test/peridot/");
        let auth = forge.get_authenticator().await.unwrap();

        forge.ensure_repository_exists(&auth, "bash").await.unwrap();
        forge.ensure_repository_exists(&auth, "bash").await.unwrap();
        forge.ensure_repository_exists(&auth, "zlib").await.unwrap();

        assert_eq!(forge.creation_count(), 2);
        assert_eq!(forge.repositories(), vec!["bash", "zlib"]);
        assert_eq!(forge.get_remote(), "https://forge.test/peridot");
    }

    #[tokio::test]
    async fn test_authenticators_are_fresh() {
        let forge = InMemoryForge::new("https://forge.test/peridot");
        let first = forge.get_authenticator().await.unwrap();
        let second = forge.get_authenticator().await.unwrap();

        assert_ne!(first.credential, second.credential);
        assert!(!first.is_expired());
        assert!(first.expires_at <= Utc::now() + authenticator_lifetime());
    }
}
