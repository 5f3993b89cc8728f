//! Database connection management

pub mod schema;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL connection pool established"
        );
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the ledger tables if they do not exist
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for (table, ddl) in schema::ALL {
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
            tracing::debug!(table, "Table ready");
        }
        tracing::info!("Ledger schema initialized");
        Ok(())
    }
}
