//! Integration tests for aggregator-core
//!
//! These tests exercise the migration engine against file-backed DuckDB
//! databases: persistence across reopen, closed handles, startup migration
//! through `AggregatorContext`, concurrent runs and the migration file lock.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use aggregator_core::adapters::{Database, MigrationLock};
use aggregator_core::services::migration::{get_db_version, init_info_table, Transaction};
use aggregator_core::services::{Migration, Migrator};
use aggregator_core::{AggregatorContext, Error};

// ============================================================================
// Test Helpers
// ============================================================================

const M2_ERROR: &str = "second migration always fails";

const CREATE_T: Migration = Migration::sql("CREATE TABLE t (col INTEGER)", "DROP TABLE t");

fn failing_step(_: &Transaction<'_>) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(M2_ERROR))
}

fn noop_step(_: &Transaction<'_>) -> anyhow::Result<()> {
    Ok(())
}

/// Open a file-backed database with the info table initialized
fn open_db(path: &Path) -> Database {
    let db = Database::open(path).expect("Failed to open database");
    init_info_table(&db).expect("Failed to initialize migration info table");
    db
}

fn table_exists(db: &Database, name: &str) -> bool {
    db.with_connection(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    })
    .unwrap()
}

fn write_settings(dir: &Path, json: &str) {
    std::fs::write(dir.join("settings.json"), json).unwrap();
}

// ============================================================================
// Engine against a database file
// ============================================================================

/// Single migration creating table T: up, down, up again
#[test]
fn test_create_table_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir.path().join("test.duckdb"));
    let migrations = [CREATE_T];
    let migrator = Migrator::new(&migrations);

    migrator.set_db_version(&db, 1).unwrap();
    assert_eq!(get_db_version(&db).unwrap(), 1);
    assert!(table_exists(&db, "t"));

    migrator.set_db_version(&db, 0).unwrap();
    assert_eq!(get_db_version(&db).unwrap(), 0);
    assert!(!table_exists(&db, "t"));

    migrator.set_db_version(&db, 1).unwrap();
    assert_eq!(get_db_version(&db).unwrap(), 1);
    assert!(table_exists(&db, "t"));
}

/// Registry [M1, M2] where M2 always fails: the walk stops at version 1
#[test]
fn test_failing_second_migration_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.duckdb");
    let migrations = [CREATE_T, Migration::new(failing_step, noop_step)];
    let migrator = Migrator::new(&migrations);

    {
        let db = open_db(&db_path);
        let err = migrator.set_db_version(&db, 2).unwrap_err();
        assert_eq!(err.to_string(), M2_ERROR);
        assert_eq!(get_db_version(&db).unwrap(), 1);
        db.close().unwrap();
    }

    // The committed step survived, the failed one left no trace
    let db = open_db(&db_path);
    assert_eq!(get_db_version(&db).unwrap(), 1);
    assert!(table_exists(&db, "t"));
}

#[test]
fn test_version_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.duckdb");
    let migrator = Migrator::default();

    {
        let db = open_db(&db_path);
        migrator.set_db_version(&db, 3).unwrap();
        db.close().unwrap();
    }

    let db = open_db(&db_path);
    assert_eq!(get_db_version(&db).unwrap(), 3);
    assert!(table_exists(&db, "cluster_rule_toggle"));
    assert!(!table_exists(&db, "cluster_rule_user_feedback"));

    migrator.set_db_version(&db, 0).unwrap();
    assert!(!table_exists(&db, "report"));
}

#[test]
fn test_closed_handle_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.duckdb");
    let migrator = Migrator::default();

    let db = open_db(&db_path);
    migrator.set_db_version(&db, 2).unwrap();
    db.close().unwrap();

    assert!(matches!(init_info_table(&db), Err(Error::DatabaseClosed)));
    assert!(matches!(get_db_version(&db), Err(Error::DatabaseClosed)));
    assert!(matches!(
        migrator.set_db_version(&db, migrator.max_version()),
        Err(Error::DatabaseClosed)
    ));

    let db = open_db(&db_path);
    assert_eq!(get_db_version(&db).unwrap(), 2);
}

#[test]
fn test_out_of_band_version_blocks_every_walk() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_db(&temp_dir.path().join("test.duckdb"));
    let migrator = Migrator::default();
    let too_high = migrator.max_version() + 1;

    db.with_connection(|conn| {
        conn.execute("UPDATE migration_info SET version = ?", [too_high])?;
        Ok(())
    })
    .unwrap();

    for target in [0, migrator.max_version()] {
        let err = migrator.set_db_version(&db, target).unwrap_err();
        assert!(matches!(err, Error::CurrentVersionOutOfBounds { .. }), "unexpected: {}", err);
    }
    assert!(!table_exists(&db, "report"));
    assert_eq!(get_db_version(&db).unwrap(), too_high);
}

// ============================================================================
// Startup migration through AggregatorContext
// ============================================================================

#[test]
fn test_context_migrates_to_latest_by_default() {
    let temp_dir = TempDir::new().unwrap();

    let ctx = AggregatorContext::new(temp_dir.path()).unwrap();

    let status = ctx.migration_status().unwrap();
    assert!(status.is_latest());
    assert_eq!(status.current, ctx.migrator.max_version());
    assert!(temp_dir.path().join("aggregator.duckdb").exists());
}

#[test]
fn test_context_honours_target_version() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"database": {"targetVersion": 2}}"#);

    let ctx = AggregatorContext::new(temp_dir.path()).unwrap();
    assert_eq!(ctx.migration_status().unwrap().current, 2);

    let report = ctx.migrate_to_latest().unwrap();
    assert_eq!(report.from, 2);
    assert_eq!(report.to, ctx.migrator.max_version());
}

#[test]
fn test_context_without_auto_migrate() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"database": {"autoMigrate": false}}"#);

    let ctx = AggregatorContext::new(temp_dir.path()).unwrap();

    let status = ctx.migration_status().unwrap();
    assert_eq!(status.current, 0);
    assert_eq!(status.pending, ctx.migrator.max_version());
}

#[test]
fn test_context_rejects_unreachable_target() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"database": {"targetVersion": 4096}}"#);

    let err = AggregatorContext::new(temp_dir.path()).err().expect("context must not open");
    assert!(err.is_configuration());
}

#[test]
fn test_context_in_memory() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"database": {"path": ":memory:"}, "auth": {"debug": true}}"#);

    let ctx = AggregatorContext::new(temp_dir.path()).unwrap();

    assert!(ctx.database.path().is_none());
    assert!(ctx.auth_service.is_debug());
    assert!(ctx.migration_status().unwrap().is_latest());
    assert_eq!(ctx.doctor_service.run_checks().unwrap().summary.errors, 0);
}

/// Threads sharing one context queue on its database handle; all end up agreeing
#[test]
fn test_concurrent_migrations_on_shared_context() {
    const THREAD_COUNT: usize = 4;

    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"database": {"autoMigrate": false}}"#);
    let ctx = Arc::new(AggregatorContext::new(temp_dir.path()).unwrap());
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.migrate_to_latest()
            })
        })
        .collect();

    let reports: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    // Exactly one thread did the work, the rest found nothing to do
    let total_steps: usize = reports.iter().map(|r| r.steps).sum();
    assert_eq!(total_steps, ctx.migrator.max_version() as usize);
    assert!(ctx.migration_status().unwrap().is_latest());
}

/// The file lock keeps a second process (here: a second handle) out of a
/// migration run until the first one is finished
#[test]
fn test_migration_lock_excludes_other_holders() {
    const THREAD_COUNT: usize = 4;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("aggregator.duckdb");
    let held = MigrationLock::acquire(&db_path).unwrap();
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let db_path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                MigrationLock::try_acquire(&db_path).map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::Lock(_)));
    }

    let finished = Arc::new(AtomicBool::new(false));
    let waiter = {
        let db_path = db_path.clone();
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            let _lock = MigrationLock::acquire(&db_path).unwrap();
            finished.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!finished.load(Ordering::SeqCst));

    drop(held);
    waiter.join().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert!(MigrationLock::try_acquire(&db_path).is_ok());
}
