//! Database migrations - the production registry
//!
//! SQL is compiled into the binary at build time using include_str!.
//! The position of a migration in `MIGRATIONS` is its version number:
//! the first entry takes an empty database to version 1.
//!
//! IMPORTANT: When adding a new migration:
//! 1. Create NNNN_description.up.sql and NNNN_description.down.sql
//!    (or write step functions for work SQL alone cannot express)
//! 2. Append an entry here. Never reorder or edit released entries.

use crate::services::migration::{Migration, Transaction};

/// All migrations, in version order
pub const MIGRATIONS: &[Migration] = &[
    Migration::sql(
        include_str!("0001_report.up.sql"),
        include_str!("0001_report.down.sql"),
    ),
    Migration::sql(
        include_str!("0002_rule.up.sql"),
        include_str!("0002_rule.down.sql"),
    ),
    Migration::sql(
        include_str!("0003_cluster_rule_toggle.up.sql"),
        include_str!("0003_cluster_rule_toggle.down.sql"),
    ),
    Migration::sql(
        include_str!("0004_cluster_rule_user_feedback.up.sql"),
        include_str!("0004_cluster_rule_user_feedback.down.sql"),
    ),
    Migration::new(rule_error_key_up, rule_error_key_down),
];

const RULE_ERROR_KEY_UP: &[&str] = &[
    "CREATE TABLE rule_error_key (
        error_key       VARCHAR NOT NULL,
        rule_module     VARCHAR NOT NULL,
        error_condition VARCHAR NOT NULL,
        description     VARCHAR NOT NULL,
        impact          INTEGER NOT NULL,
        likelihood      INTEGER NOT NULL,
        publish_date    TIMESTAMP NOT NULL,
        active          BOOLEAN NOT NULL,
        generic         VARCHAR NOT NULL,
        PRIMARY KEY (error_key, rule_module)
    )",
    "CREATE INDEX report_last_checked_at_idx ON report (last_checked_at)",
];

const RULE_ERROR_KEY_DOWN: &[&str] = &[
    "DROP INDEX report_last_checked_at_idx",
    "DROP TABLE rule_error_key",
];

fn rule_error_key_up(tx: &Transaction<'_>) -> anyhow::Result<()> {
    for sql in RULE_ERROR_KEY_UP {
        tx.execute_batch(sql)?;
    }
    Ok(())
}

fn rule_error_key_down(tx: &Transaction<'_>) -> anyhow::Result<()> {
    for sql in RULE_ERROR_KEY_DOWN {
        tx.execute_batch(sql)?;
    }
    Ok(())
}
