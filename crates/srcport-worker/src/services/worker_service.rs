//! Worker identities and liveness

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use sha2::{Digest, Sha256};
use srcport_core::{AuthenticatedIdentity, NameGenerator, ServiceError, ServiceResult};
use srcport_database::DbConnection;
use srcport_entities::workers;
use std::sync::Arc;
use tracing::{debug, info};

const WORKER_COLLECTION: &str = "workers";
const INVALID_CREDENTIALS: &str = "invalid worker credentials";

fn digest_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub struct WorkerRegistry {
    db: Arc<DbConnection>,
    names: Arc<dyn NameGenerator>,
}

impl WorkerRegistry {
    /// `names` generates the resource name of newly registered workers
    pub fn new(db: Arc<DbConnection>, names: Arc<dyn NameGenerator>) -> Self {
        Self { db, names }
    }

    async fn find_by_worker_id(&self, worker_id: &str) -> ServiceResult<Option<workers::Model>> {
        Ok(workers::Entity::find()
            .filter(workers::Column::WorkerId.eq(worker_id))
            .one(self.db.as_ref())
            .await?)
    }

    /// Create the worker, or rotate its secret when it is already registered.
    pub async fn register(&self, worker_id: &str, secret: &str) -> ServiceResult<workers::Model> {
        if worker_id.is_empty() || secret.is_empty() {
            return Err(ServiceError::AuthFailure(
                "worker id and secret must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.find_by_worker_id(worker_id).await? {
            let mut active = existing.into_active_model();
            active.api_secret = Set(digest_secret(secret));
            let worker = active.update(self.db.as_ref()).await?;
            info!("rotated secret for worker {}", worker_id);
            return Ok(worker);
        }

        let worker = workers::ActiveModel {
            name: Set(self.names.generate(WORKER_COLLECTION)),
            worker_id: Set(worker_id.to_string()),
            api_secret: Set(digest_secret(secret)),
            last_checkin_time: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        info!("registered worker {} as {}", worker_id, worker.name);
        Ok(worker)
    }

    /// Check presented credentials. Unknown workers and wrong secrets fail
    /// with the same error.
    pub async fn authenticate(
        &self,
        worker_id: &str,
        secret: &str,
    ) -> ServiceResult<AuthenticatedIdentity> {
        let presented = digest_secret(secret);
        match self.find_by_worker_id(worker_id).await? {
            Some(worker)
                if constant_time_eq(worker.api_secret.as_bytes(), presented.as_bytes()) =>
            {
                Ok(AuthenticatedIdentity::new(worker.worker_id))
            }
            _ => {
                debug!("rejected credentials for worker {}", worker_id);
                Err(ServiceError::AuthFailure(INVALID_CREDENTIALS.to_string()))
            }
        }
    }

    /// Load the worker row behind an authenticated identity. A worker that
    /// vanished after authenticating is an `AuthFailure`, not `NotFound`.
    pub async fn resolve_identity(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> ServiceResult<workers::Model> {
        self.find_by_worker_id(&identity.worker_id)
            .await?
            .ok_or_else(|| {
                ServiceError::AuthFailure(format!(
                    "worker {} could not be resolved",
                    identity.worker_id
                ))
            })
    }

    /// Record a check-in. The stored time never moves backwards.
    pub async fn set_worker_last_checkin_time(
        &self,
        worker_id: &str,
    ) -> ServiceResult<workers::Model> {
        let worker = self
            .find_by_worker_id(worker_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("worker"))?;

        let now = Utc::now();
        let checkin = match worker.last_checkin_time {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        let mut active = worker.into_active_model();
        active.last_checkin_time = Set(Some(checkin));
        let worker = active.update(self.db.as_ref()).await?;
        debug!("worker {} checked in", worker_id);
        Ok(worker)
    }
}
