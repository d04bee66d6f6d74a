//! Entry lifecycle
//!
//! Every operation either fails before issuing a write or performs exactly
//! one single-row write, so an abandoned or retried call never leaves a
//! half-updated entry behind.

use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use srcport_core::{NameGenerator, ServiceError, ServiceResult};
use srcport_database::DbConnection;
use srcport_entities::entries::{self, ImportResult};
use srcport_entities::types::EntryState;
use srcport_rpm::{PackageHeader, ResourceFetcher, TrustedKeys};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::TransitionTable;

const ENTRY_COLLECTION: &str = "entries";

/// Inputs for a new import entry
#[derive(Debug, Clone)]
pub struct CreateEntryRequest {
    pub rpm_uri: String,
    pub os_release: String,
    pub checksum: String,
    pub repository: String,
    pub worker_id: String,
}

pub struct EntryService {
    db: Arc<DbConnection>,
    fetcher: Arc<dyn ResourceFetcher>,
    trusted_keys: Arc<TrustedKeys>,
    names: Arc<dyn NameGenerator>,
    transitions: TransitionTable,
}

impl EntryService {
    /// Create a service with the permissive transition table. Packages are
    /// only accepted when signed by one of `trusted_keys`.
    pub fn new(
        db: Arc<DbConnection>,
        fetcher: Arc<dyn ResourceFetcher>,
        trusted_keys: Arc<TrustedKeys>,
        names: Arc<dyn NameGenerator>,
    ) -> Self {
        Self {
            db,
            fetcher,
            trusted_keys,
            names,
            transitions: TransitionTable::permissive(),
        }
    }

    /// Replace the transition table consulted by [`Self::set_entry_state`]
    pub fn with_transitions(mut self, transitions: TransitionTable) -> Self {
        self.transitions = transitions;
        self
    }

    /// Persist a new entry in `archiving` with a freshly generated name and
    /// no commit provenance.
    pub async fn create_entry(&self, request: CreateEntryRequest) -> ServiceResult<entries::Model> {
        let name = self.names.generate(ENTRY_COLLECTION);

        let mut entry = entries::ActiveModel {
            name: Set(name.clone()),
            entry_id: Set(None),
            os_release: Set(request.os_release),
            sha256_sum: Set(request.checksum),
            repository: Set(request.repository),
            state: Set(EntryState::Archiving),
            worker_id: Set(request.worker_id),
            ..Default::default()
        };
        entry.set_import_result(None);

        let entry = entry.insert(self.db.as_ref()).await?;
        info!(
            "created entry {} for {} (worker {})",
            name, request.rpm_uri, entry.worker_id
        );
        Ok(entry)
    }

    /// Load an entry by name; `NotFound` when there is none
    pub async fn get_entry(&self, name: &str) -> ServiceResult<entries::Model> {
        entries::Entity::find_by_id(name.to_string())
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("entry"))
    }

    /// Download the artifact at `uri`, check its signature, read its header
    /// and record the source package identifier on the entry.
    pub async fn set_entry_id_from_rpm(
        &self,
        name: &str,
        uri: &str,
        checksum: &str,
    ) -> ServiceResult<entries::Model> {
        let entry = self.get_entry(name).await?;

        let content = self.fetcher.fetch(uri, checksum).await.map_err(|e| {
            warn!("failed to download {} for entry {}: {}", uri, name, e);
            ServiceError::from(e)
        })?;
        self.trusted_keys.verify_package(&content).map_err(|e| {
            warn!("rejecting {} for entry {}: {}", uri, name, e);
            ServiceError::from(e)
        })?;
        let header = PackageHeader::parse(&content)?;
        let entry_id = header.source_entry_id();
        debug!("{} resolved to {}", uri, header.nevra());

        if let Some(previous) = entry.entry_id.as_deref() {
            if previous != entry_id {
                warn!(
                    "entry {} already had id {}, replacing with {}",
                    name, previous, entry_id
                );
            }
        }

        let mut active = entry.into_active_model();
        active.entry_id = Set(Some(entry_id));
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Move the entry to `state`. The commit provenance columns are set
    /// from `result` when present and cleared otherwise.
    pub async fn set_entry_state(
        &self,
        name: &str,
        state: EntryState,
        result: Option<&ImportResult>,
    ) -> ServiceResult<entries::Model> {
        let entry = self.get_entry(name).await?;
        self.transitions.check(entry.state, state)?;

        let previous = entry.state;
        let mut active = entry.into_active_model();
        active.state = Set(state);
        active.set_import_result(result);
        let entry = active.update(self.db.as_ref()).await?;

        info!("entry {} moved from {} to {}", name, previous, state);
        Ok(entry)
    }
}
