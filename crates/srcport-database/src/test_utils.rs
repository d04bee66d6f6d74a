//! Test utilities for database-backed tests
//!
//! Each [`TestDatabase`] is a private in-memory SQLite database with the
//! srcport schema applied, so tests never share rows.

use crate::DbConnection;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseBackend, Statement};
use sea_orm_migration::MigratorTrait;
use srcport_migrations::Migrator;
use std::sync::Arc;

pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    /// Create a fresh in-memory database and run all migrations
    pub async fn with_migrations() -> anyhow::Result<Self> {
        // One pooled connection: every new SQLite memory connection is a new database.
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create test database: {}", e))?;

        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Count the rows of a table, for asserting on side effects
    pub async fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        let statement = Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("SELECT COUNT(*) AS n FROM {}", table),
        );
        let row = self
            .db
            .query_one(statement)
            .await?
            .ok_or_else(|| anyhow::anyhow!("COUNT returned no row"))?;
        Ok(row.try_get::<i64>("", "n")?)
    }

    pub fn connection(&self) -> &DbConnection {
        &self.db
    }

    pub fn connection_arc(&self) -> Arc<DbConnection> {
        Arc::clone(&self.db)
    }
}
