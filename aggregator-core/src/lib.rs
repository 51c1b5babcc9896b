//! Aggregator Core - result store schema and request identity
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Core data types (versions, identities, errors)
//! - **services**: Business logic (migration engine, health checks, auth)
//! - **adapters**: Concrete implementations (DuckDB handle, file lock)
//! - **migrations**: The production migration registry

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::{Database, MigrationLock};
use config::Config;
use services::migration;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{Direction, Identity, MigrationReport, MigrationStatus, Version};

/// Main context for aggregator operations
///
/// Holds the database handle, configuration and all services. Creating it
/// initializes the migration info table and, unless disabled, migrates the
/// schema before anything else touches the database.
pub struct AggregatorContext {
    pub config: Config,
    pub database: Arc<Database>,
    pub migrator: Migrator<'static>,
    pub doctor_service: DoctorService,
    pub auth_service: AuthService,
}

impl AggregatorContext {
    /// Create a new context from the settings in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let database = Arc::new(match config.database_path() {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        });
        let migrator = Migrator::default();

        {
            let _lock = lock_migrations(&database)?;
            migration::init_info_table(&database)?;

            if config.auto_migrate {
                let target = config.target_version.unwrap_or_else(|| migrator.max_version());
                let report = migrator.set_db_version(&database, target)?;
                if !report.is_noop() {
                    tracing::info!(from = report.from, to = report.to, "schema migrated on startup");
                }
            }
        }

        let doctor_service = DoctorService::new(Arc::clone(&database), migrator);
        let auth_service = AuthService::new(config.auth_debug);

        Ok(Self {
            config,
            database,
            migrator,
            doctor_service,
            auth_service,
        })
    }

    /// Current and latest schema version
    pub fn migration_status(&self) -> Result<MigrationStatus> {
        self.migrator.status(&self.database)
    }

    /// Move the schema to `target` while holding the migration lock
    pub fn migrate_to(&self, target: Version) -> Result<MigrationReport> {
        let _lock = lock_migrations(&self.database)?;
        self.migrator.set_db_version(&self.database, target)
    }

    /// Apply all pending migrations while holding the migration lock
    pub fn migrate_to_latest(&self) -> Result<MigrationReport> {
        self.migrate_to(self.migrator.max_version())
    }
}

/// In-memory databases are private to this process and need no lock
fn lock_migrations(database: &Database) -> Result<Option<MigrationLock>> {
    database.path().map(MigrationLock::acquire).transpose()
}
