use clap::Args;
use srcport_core::{DatabaseConfig, UuidNameGenerator, WorkerConfig};
use srcport_worker::{build_router, AppState, WorkerRegistry};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Args)]
pub struct ServeCommand {
    /// Database connection URL
    #[arg(long, env = "SRCPORT_DATABASE_URL")]
    pub database_url: String,

    /// Maximum database pool size
    #[arg(long, default_value_t = 20, env = "SRCPORT_DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,

    /// Address the heartbeat server listens on
    #[arg(long, default_value = "0.0.0.0:8080", env = "SRCPORT_LISTEN_ADDRESS")]
    pub address: String,
}

impl ServeCommand {
    fn config(&self) -> WorkerConfig {
        let mut database = DatabaseConfig::new(self.database_url.clone());
        database.max_connections = self.database_max_connections;
        database.min_connections = database.min_connections.min(database.max_connections);

        WorkerConfig {
            database,
            listen_address: self.address.clone(),
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.config();
        debug!("Starting with {:?}", config);

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(serve(config))
    }
}

async fn serve(config: WorkerConfig) -> anyhow::Result<()> {
    let db = srcport_database::establish_connection(&config.database).await?;

    let state = Arc::new(AppState {
        worker_registry: Arc::new(WorkerRegistry::new(db, Arc::new(UuidNameGenerator))),
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!("Heartbeat server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
