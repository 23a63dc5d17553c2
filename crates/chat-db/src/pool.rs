//! Database connection pool management
//!
//! Provides the PostgreSQL-backed [`Database`] used by the attachment service.

use std::time::Duration;

use async_trait::async_trait;
use chat_attachments::{Database, RepositoryError, RepositoryResult};
use chat_core::config::DatabaseConfig;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use crate::attachments::PgAttachmentRepository;
use crate::messages::PgMessageRepository;
use crate::repository::map_sqlx_error;
use crate::users::PgUserDirectory;

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL database
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    attachments: PgAttachmentRepository,
    messages: PgMessageRepository,
}

impl PgDatabase {
    /// Create a new database connection pool
    pub async fn connect(url: &str, config: &DatabaseConfig) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Self::from_pool(pool);
        if config.migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            attachments: PgAttachmentRepository::new(pool.clone()),
            messages: PgMessageRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> RepositoryResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(RepositoryError::database)?;
        info!("Database migrations applied");
        Ok(())
    }

    /// User directory sharing this pool
    pub fn users(&self) -> PgUserDirectory {
        PgUserDirectory::new(self.pool.clone())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = Transaction<'static, Postgres>;
    type Attachments = PgAttachmentRepository;
    type Messages = PgMessageRepository;

    async fn begin(&self) -> RepositoryResult<Self::Tx> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    async fn commit(&self, tx: Self::Tx) -> RepositoryResult<()> {
        tx.commit().await.map_err(map_sqlx_error)?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> RepositoryResult<()> {
        tx.rollback().await.map_err(map_sqlx_error)?;
        debug!("Transaction rolled back");
        Ok(())
    }

    fn attachments(&self) -> &PgAttachmentRepository {
        &self.attachments
    }

    fn messages(&self) -> &PgMessageRepository {
        &self.messages
    }
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}
