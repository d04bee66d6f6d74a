//! Activities invoked by the workflow engine for one package import
//!
//! Each activity is independently retryable; whether a failure should be
//! retried is answered by [`srcport_core::ServiceError::is_retryable`].

use srcport_core::{ServiceError, ServiceResult};
use srcport_entities::entries::{self, ImportResult};
use srcport_entities::types::EntryState;
use srcport_forge::{Authenticator, Forge};
use std::sync::Arc;
use tracing::info;

use crate::services::{CreateEntryRequest, EntryService};

/// Where to push an import and with which credentials
#[derive(Debug, Clone)]
pub struct PreparedRepository {
    pub remote_url: String,
    pub authenticator: Authenticator,
}

pub struct ImportActivities {
    entries: Arc<EntryService>,
    forge: Arc<dyn Forge>,
}

impl ImportActivities {
    pub fn new(entries: Arc<EntryService>, forge: Arc<dyn Forge>) -> Self {
        Self { entries, forge }
    }

    pub async fn create_entry(&self, request: CreateEntryRequest) -> ServiceResult<entries::Model> {
        self.entries.create_entry(request).await
    }

    pub async fn set_entry_id_from_rpm(
        &self,
        name: &str,
        uri: &str,
        checksum: &str,
    ) -> ServiceResult<entries::Model> {
        self.entries.set_entry_id_from_rpm(name, uri, checksum).await
    }

    pub async fn set_entry_state(
        &self,
        name: &str,
        state: EntryState,
        result: Option<&ImportResult>,
    ) -> ServiceResult<entries::Model> {
        self.entries.set_entry_state(name, state, result).await
    }

    /// Mint fresh push credentials and make sure the package repository exists.
    pub async fn prepare_repository(&self, pkg: &str) -> ServiceResult<PreparedRepository> {
        if pkg.is_empty() || pkg.contains('/') {
            return Err(ServiceError::InvalidPackage(format!(
                "invalid repository name {:?}",
                pkg
            )));
        }

        let authenticator = self.forge.get_authenticator().await?;
        self.forge
            .ensure_repository_exists(&authenticator, pkg)
            .await?;

        let remote_url = format!("{}/{}", self.forge.get_remote(), pkg);
        info!("{} forge repository ready at {}", self.forge.kind(), remote_url);
        Ok(PreparedRepository {
            remote_url,
            authenticator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srcport_core::SequentialNameGenerator;
    use srcport_database::test_utils::TestDatabase;
    use srcport_forge::InMemoryForge;
    use srcport_rpm::test_utils::{build_source_rpm, PackageSigner, SourceRpmBuilder};
    use srcport_rpm::MemoryFetcher;

    async fn setup() -> anyhow::Result<(TestDatabase, ImportActivities, Arc<InMemoryForge>)> {
        let db = TestDatabase::with_migrations().await?;
        let fetcher = MemoryFetcher::new();
        fetcher
            .insert(
                "efi-rpm-macros-3-3.el8.src.rpm",
                build_source_rpm("efi-rpm-macros", "3", "3.el8"),
            )
            .await;
        fetcher
            .insert(
                "evil-1-1.src.rpm",
                SourceRpmBuilder::new("evil", "1", "1").build(),
            )
            .await;
        let entries = EntryService::new(
            db.connection_arc(),
            Arc::new(fetcher),
            Arc::new(PackageSigner::test_key().trusted_keys()),
            Arc::new(SequentialNameGenerator::new()),
        );
        let forge = Arc::new(InMemoryForge::new("https://testforge.resf.org/peridot"));
        let activities = ImportActivities::new(Arc::new(entries), forge.clone());
        Ok((db, activities, forge))
    }

    #[tokio::test]
    async fn test_import_flow() -> anyhow::Result<()> {
        let (_db, activities, forge) = setup().await?;

        let entry = activities
            .create_entry(CreateEntryRequest {
                rpm_uri: "memory://efi-rpm-macros-3-3.el8.src.rpm".into(),
                os_release: "Rocky Linux release 8.8 (Green Obsidian)".into(),
                checksum: String::new(),
                repository: "BaseOS".into(),
                worker_id: "test-worker".into(),
            })
            .await?;
        let entry = activities
            .set_entry_id_from_rpm(&entry.name, "memory://efi-rpm-macros-3-3.el8.src.rpm", "")
            .await?;
        assert_eq!(entry.entry_id.as_deref(), Some("efi-rpm-macros-3-3.el8.src"));
        let pkg = entry.package_name().unwrap();

        let prepared = activities.prepare_repository(pkg).await?;
        assert_eq!(
            prepared.remote_url,
            "https://testforge.resf.org/peridot/efi-rpm-macros"
        );
        assert!(!prepared.authenticator.is_expired());
        activities.prepare_repository(pkg).await?;
        assert_eq!(forge.creation_count(), 1);
        assert_eq!(forge.repositories(), vec!["efi-rpm-macros"]);

        let result = ImportResult {
            commit_hash: "123".into(),
            commit_uri: format!("{}/commit/123", prepared.remote_url),
            commit_branch: "el-8.8".into(),
            commit_tag: "imports/el-8.8/efi-rpm-macros-3-3.el8".into(),
            pkg: "efi-rpm-macros".into(),
        };
        let entry = activities
            .set_entry_state(&entry.name, EntryState::Archived, Some(&result))
            .await?;
        assert_eq!(entry.state, EntryState::Archived);
        assert_eq!(
            entry.commit_uri,
            "https://testforge.resf.org/peridot/efi-rpm-macros/commit/123"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unsigned_package_stops_import() -> anyhow::Result<()> {
        let (_db, activities, forge) = setup().await?;

        let entry = activities
            .create_entry(CreateEntryRequest {
                rpm_uri: "memory://evil-1-1.src.rpm".into(),
                os_release: "Rocky Linux release 8.8 (Green Obsidian)".into(),
                checksum: String::new(),
                repository: "BaseOS".into(),
                worker_id: "test-worker".into(),
            })
            .await?;
        let err = activities
            .set_entry_id_from_rpm(&entry.name, "memory://evil-1-1.src.rpm", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SignatureVerification(_)));
        assert!(!err.is_retryable());

        let entry = activities
            .set_entry_state(&entry.name, EntryState::Failed, None)
            .await?;
        assert_eq!(entry.entry_id, None);
        assert_eq!(entry.package_name(), None);
        assert!(forge.repositories().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_prepare_repository_rejects_bad_names() -> anyhow::Result<()> {
        let (_db, activities, forge) = setup().await?;
        for name in ["", "a/b"] {
            let err = activities.prepare_repository(name).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidPackage(_)));
        }
        assert_eq!(forge.creation_count(), 0);
        Ok(())
    }
}
