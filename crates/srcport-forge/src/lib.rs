//! Git forge backends
//!
//! A [`Forge`] hands out short-lived push credentials together with the
//! commit identity to author imports as, and makes sure the target
//! repository exists before anything is pushed to it.

mod error;
mod forge;
pub mod github;
pub mod memory;

pub use error::ForgeError;
pub use forge::{
    authenticator_lifetime, Authenticator, Forge, ForgeKind, TransportCredential,
    AUTHENTICATOR_LIFETIME_MINUTES,
};
pub use github::GitHubForge;
pub use memory::InMemoryForge;

use srcport_core::ForgeSettings;
use std::sync::Arc;

/// Build the forge backend selected by `settings`.
pub fn build_forge(settings: &ForgeSettings) -> Result<Arc<dyn Forge>, ForgeError> {
    match settings {
        ForgeSettings::GitHub {
            organization,
            app_id,
            private_key_pem,
            make_repos_public,
            api_url,
            web_url,
        } => {
            let forge = GitHubForge::new(
                organization,
                app_id,
                private_key_pem,
                *make_repos_public,
                api_url,
                web_url,
            )?;
            Ok(Arc::new(forge))
        }
        ForgeSettings::Memory { remote_url } => Ok(Arc::new(InMemoryForge::new(remote_url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_forge() {
        let forge = build_forge(&ForgeSettings::Memory {
            remote_url: "https://forge.test/peridot".into(),
        })
        .unwrap();
        assert_eq!(forge.kind(), ForgeKind::Memory);
        assert_eq!(forge.get_remote(), "https://forge.test/peridot");
    }

    #[test]
    fn test_build_github_forge_rejects_bad_key() {
        let result = build_forge(&ForgeSettings::GitHub {
            organization: "peridot".into(),
            app_id: "1234".into(),
            private_key_pem: "not a key".into(),
            make_repos_public: false,
            api_url: srcport_core::DEFAULT_GITHUB_API_URL.into(),
            web_url: srcport_core::DEFAULT_GITHUB_WEB_URL.into(),
        });
        assert!(matches!(result, Err(ForgeError::InvalidConfiguration(_))));
    }
}
