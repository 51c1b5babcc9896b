//! Migrator - walks a database between versions of one registry
//!
//! Every step runs in its own transaction together with the version update,
//! so a failure leaves the database at the last committed version.

use duckdb::Connection;

use super::info;
use super::transaction::with_transaction;
use super::{Migration, Step};
use crate::adapters::Database;
use crate::domain::result::{Error, Result};
use crate::domain::{Direction, MigrationReport, MigrationStatus, Version};
use crate::migrations::MIGRATIONS;

/// Walks the schema between versions of one registry.
///
/// The registry is injected, so tests run synthetic migrations without
/// touching any shared state.
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'a> {
    migrations: &'a [Migration],
}

impl Default for Migrator<'static> {
    /// Migrator over the production registry
    fn default() -> Self {
        Self::new(MIGRATIONS)
    }
}

impl<'a> Migrator<'a> {
    pub fn new(migrations: &'a [Migration]) -> Self {
        Self { migrations }
    }

    pub fn migrations(&self) -> &'a [Migration] {
        self.migrations
    }

    /// Highest reachable version, i.e. the registry length
    pub fn max_version(&self) -> Version {
        self.migrations.len() as Version
    }

    /// Current and maximum version of the database
    pub fn status(&self, db: &Database) -> Result<MigrationStatus> {
        let max = self.max_version();
        let current = info::get_db_version(db)?;
        if current > max {
            return Err(Error::CurrentVersionOutOfBounds { current, max });
        }
        Ok(MigrationStatus {
            current,
            max,
            pending: max - current,
        })
    }

    /// Apply every pending migration
    pub fn migrate_to_latest(&self, db: &Database) -> Result<MigrationReport> {
        self.set_db_version(db, self.max_version())
    }

    /// Move the schema to `target`, one committed step at a time.
    ///
    /// Stops at the first failing step and returns its error; the stored
    /// version is then the last one successfully committed.
    pub fn set_db_version(&self, db: &Database, target: Version) -> Result<MigrationReport> {
        let max = self.max_version();
        if target > max {
            return Err(Error::InvalidTargetVersion { target, max });
        }
        db.with_connection(|conn| self.walk(conn, target))
    }

    fn walk(&self, conn: &Connection, target: Version) -> Result<MigrationReport> {
        let max = self.max_version();
        let current = info::read_version(conn)?;
        if current > max {
            return Err(Error::CurrentVersionOutOfBounds { current, max });
        }

        if target == current {
            tracing::debug!(version = current, "database already at requested version");
            return Ok(MigrationReport {
                from: current,
                to: target,
                direction: Direction::None,
                steps: 0,
            });
        }

        let direction = if target > current {
            for version in current + 1..=target {
                self.step(conn, &self.migration(version).step_up, Direction::Up, version)?;
            }
            Direction::Up
        } else {
            for version in (target + 1..=current).rev() {
                self.step(conn, &self.migration(version).step_down, Direction::Down, version - 1)?;
            }
            Direction::Down
        };

        Ok(MigrationReport {
            from: current,
            to: target,
            direction,
            steps: current.abs_diff(target) as usize,
        })
    }

    /// Run one step and record `new_version`, atomically
    fn step(&self, conn: &Connection, step: &Step, direction: Direction, new_version: Version) -> Result<()> {
        with_transaction(conn, |tx| {
            step.run(tx)?;
            info::update_version(tx, new_version)
        })
        .inspect_err(|e| {
            tracing::warn!(?direction, version = new_version, "migration step failed: {}", e);
        })?;

        tracing::info!(?direction, version = new_version, "migration step committed");
        Ok(())
    }

    /// Migration taking the schema from `version - 1` to `version`
    fn migration(&self, version: Version) -> &'a Migration {
        &self.migrations[version as usize - 1]
    }
}
