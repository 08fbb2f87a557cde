//! # dupli-db
//!
//! PostgreSQL store and blob storage backend for the dupli engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The asset, fingerprint (hash index), and cluster repositories
//! - The transactional cluster merge with per-owner advisory locking
//! - A filesystem [`StorageBackend`] for fetched bytes and thumbnails
//!
//! ## Example
//!
//! ```rust,ignore
//! use dupli_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/dupli").await?;
//!     db.migrate().await?;
//!
//!     let candidates = db.fingerprints.find_candidates(owner, 0x1234, 1).await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod clusters;
pub mod fingerprints;
pub mod pool;
pub mod storage;

// Re-export core types
pub use dupli_core::*;

// Re-export repository implementations
pub use assets::PgAssetRepository;
pub use clusters::PgClusterRepository;
pub use fingerprints::PgFingerprintRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use storage::{FilesystemBackend, StorageBackend};

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Asset repository.
    pub assets: PgAssetRepository,
    /// Fingerprint index repository.
    pub fingerprints: PgFingerprintRepository,
    /// Duplicate cluster repository.
    pub clusters: PgClusterRepository,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build the repository context over an existing pool.
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self {
            assets: PgAssetRepository::new(pool.clone()),
            fingerprints: PgFingerprintRepository::new(pool.clone()),
            clusters: PgClusterRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {}", e)))
    }
}
