//! Schema migration domain types

use serde::Serialize;

/// Number of migrations applied, in registry order. 0 means an empty schema.
pub type Version = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    None,
}

/// Outcome of a successful `set_db_version` walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from: Version,
    pub to: Version,
    pub direction: Direction,
    /// Number of committed steps
    pub steps: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.steps == 0
    }
}

/// Read-only view of where the schema stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub current: Version,
    pub max: Version,
    pub pending: Version,
}

impl MigrationStatus {
    pub fn is_latest(&self) -> bool {
        self.pending == 0
    }
}
