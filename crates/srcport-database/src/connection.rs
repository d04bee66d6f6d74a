//! Database connection management

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use srcport_core::{DatabaseConfig, ServiceError, ServiceResult};
use srcport_migrations::{Migrator, MigratorTrait};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type DbConnection = DatabaseConnection;

/// Connect to the configured database and bring the schema up to date.
pub async fn establish_connection(config: &DatabaseConfig) -> ServiceResult<Arc<DbConnection>> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Internal(format!("failed to connect to database: {}", e)))?;

    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Internal(format!("failed to run migrations: {}", e)))?;

    info!(
        "database ready ({:?} backend)",
        sea_orm::ConnectionTrait::get_database_backend(&db)
    );

    Ok(Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::SchemaManager;

    #[tokio::test]
    async fn test_establish_connection_runs_migrations() -> anyhow::Result<()> {
        let mut config = DatabaseConfig::new("sqlite::memory:");
        config.max_connections = 1;
        config.min_connections = 1;

        let db = establish_connection(&config).await?;

        let manager = SchemaManager::new(db.as_ref());
        assert!(manager.has_table("entries").await?);
        assert!(manager.has_table("workers").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_establish_connection_bad_url() {
        let config = DatabaseConfig::new("not-a-database://nowhere");
        let err = establish_connection(&config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
