//! Migration info table - the single persisted record of the schema version
//!
//! Once initialized the table holds exactly one row. Any other row count is
//! reported as corruption and never repaired here.

use duckdb::{params, Connection};

use super::transaction::{with_transaction, Transaction};
use crate::adapters::Database;
use crate::domain::result::{Error, Result};
use crate::domain::Version;

pub const INFO_TABLE: &str = "migration_info";

/// Create the info table with version 0 if it does not exist yet.
///
/// Calling it on an initialized database is a no-op. Fails if the table does
/// not end up with exactly one row.
pub fn init_info_table(db: &Database) -> Result<()> {
    db.with_connection(init_on)
}

/// Read the currently applied version
pub fn get_db_version(db: &Database) -> Result<Version> {
    db.with_connection(read_version)
}

pub(crate) fn init_on(conn: &Connection) -> Result<()> {
    with_transaction(conn, |tx| {
        if !info_table_exists(tx)? {
            tx.execute_batch("CREATE TABLE IF NOT EXISTS migration_info (version UINTEGER NOT NULL)")?;
            tx.execute("INSERT INTO migration_info (version) VALUES (0)", [])?;
            tracing::debug!(table = INFO_TABLE, "created migration info table");
        }

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM migration_info", [], |row| row.get(0))?;
        if count != 1 {
            return Err(Error::UnexpectedRowCount(count.max(0) as u64));
        }
        Ok(())
    })
}

pub(crate) fn read_version(conn: &Connection) -> Result<Version> {
    let mut stmt = conn.prepare("SELECT version FROM migration_info")?;
    let mut rows = stmt.query([])?;

    let version: Version = match rows.next()? {
        Some(row) => row.get(0)?,
        None => return Err(Error::EmptyInfoTable),
    };

    if rows.next()?.is_some() {
        return Err(Error::MultipleInfoRows);
    }
    Ok(version)
}

/// Overwrite the stored version. Must run in the same transaction as the
/// schema change it records.
pub(crate) fn update_version(tx: &Transaction<'_>, version: Version) -> Result<()> {
    let affected = tx.execute("UPDATE migration_info SET version = ?", params![version])?;
    if affected != 1 {
        return Err(Error::UnexpectedAffectedRows(affected));
    }
    Ok(())
}

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?";

/// Whether the info table exists, without touching it
pub fn has_info_table(db: &Database) -> Result<bool> {
    db.with_connection(|conn| {
        let count: i64 = conn.query_row(TABLE_EXISTS_SQL, [INFO_TABLE], |row| row.get(0))?;
        Ok(count > 0)
    })
}

pub(crate) fn info_table_exists(tx: &Transaction<'_>) -> Result<bool> {
    let count: i64 = tx.query_row(TABLE_EXISTS_SQL, [INFO_TABLE], |row| row.get(0))?;
    Ok(count > 0)
}
