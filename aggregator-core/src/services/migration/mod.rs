//! Migration service - moves the schema between numbered versions
//!
//! A registry is an ordered slice of [`Migration`]s; the migration at index
//! `i` takes the schema from version `i` to `i + 1`. The applied version is
//! kept in a one-row table (see [`info`]) and updated in the same
//! transaction as every step, so the stored version always matches the
//! schema.
//!
//! Callers serialize migration runs against one database themselves, e.g.
//! with [`crate::adapters::MigrationLock`].

use std::fmt;

pub mod info;
mod migrator;
pub mod transaction;

pub use info::{get_db_version, has_info_table, init_info_table, INFO_TABLE};
pub use migrator::Migrator;
pub use transaction::{with_transaction, Transaction};

use crate::domain::result::{Error, Result};

/// Signature of a step implemented in code rather than SQL
pub type StepFn = fn(&Transaction<'_>) -> anyhow::Result<()>;

/// One direction of a migration, run inside the runner's transaction.
///
/// Steps never begin or commit transactions themselves.
#[derive(Clone, Copy)]
pub enum Step {
    /// SQL batch executed as-is
    Sql(&'static str),
    /// Arbitrary schema work
    Func(StepFn),
}

impl Step {
    pub(crate) fn run(&self, tx: &Transaction<'_>) -> Result<()> {
        match self {
            Step::Sql(sql) => tx.execute_batch(sql),
            Step::Func(f) => f(tx).map_err(Error::Step),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Step::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// A forward/reverse pair, identified only by its position in the registry.
///
/// Released migrations are never reordered or edited; new ones are appended.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub step_up: Step,
    pub step_down: Step,
}

impl Migration {
    /// Migration from two step functions
    pub const fn new(step_up: StepFn, step_down: StepFn) -> Self {
        Self {
            step_up: Step::Func(step_up),
            step_down: Step::Func(step_down),
        }
    }

    /// Migration from two SQL batches
    pub const fn sql(up: &'static str, down: &'static str) -> Self {
        Self {
            step_up: Step::Sql(up),
            step_down: Step::Sql(down),
        }
    }
}
