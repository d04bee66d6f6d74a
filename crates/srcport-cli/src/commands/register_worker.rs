use clap::Args;
use srcport_core::{DatabaseConfig, UuidNameGenerator};
use srcport_worker::WorkerRegistry;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Args)]
pub struct RegisterWorkerCommand {
    /// Database connection URL
    #[arg(long, env = "SRCPORT_DATABASE_URL")]
    pub database_url: String,

    /// Identifier the worker authenticates as
    #[arg(long, env = "SRCPORT_WORKER_ID")]
    pub worker_id: String,

    /// Shared secret; only its SHA-256 digest is stored
    #[arg(long, env = "SRCPORT_WORKER_SECRET", hide_env_values = true)]
    pub secret: String,
}

impl RegisterWorkerCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        debug!("Initializing database connection...");
        let rt = tokio::runtime::Runtime::new()?;
        let db = rt.block_on(srcport_database::establish_connection(
            &DatabaseConfig::new(self.database_url.clone()),
        ))?;

        let registry = WorkerRegistry::new(db, Arc::new(UuidNameGenerator));
        let worker = rt.block_on(registry.register(&self.worker_id, &self.secret))?;

        info!("Worker {} registered as {}", worker.worker_id, worker.name);
        Ok(())
    }
}
