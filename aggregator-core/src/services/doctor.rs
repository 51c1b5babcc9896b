//! Doctor service - schema health checks

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::adapters::Database;
use crate::domain::result::{Error, Result};
use crate::services::migration::{self, Migrator};

/// Doctor service for health checks. Never modifies the database.
pub struct DoctorService {
    database: Arc<Database>,
    migrator: Migrator<'static>,
}

impl DoctorService {
    pub fn new(database: Arc<Database>, migrator: Migrator<'static>) -> Self {
        Self { database, migrator }
    }

    /// Run all health checks
    ///
    /// Corruption of the version record is reported as a failed check;
    /// only driver errors (e.g. a closed database) abort the run.
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();
        let max = self.migrator.max_version();

        let version = match migration::get_db_version(&self.database) {
            Ok(version) => {
                checks.insert("info_table".to_string(), CheckResult::pass("Migration info table holds one row"));
                Some(version)
            }
            Err(e) if e.is_corruption() => {
                checks.insert("info_table".to_string(), CheckResult::error(e.to_string()));
                None
            }
            Err(Error::Database(e)) => {
                let check = if migration::has_info_table(&self.database)? {
                    CheckResult::error(e.to_string())
                } else {
                    CheckResult::error("Migration info table is not initialized")
                        .with_details(vec![json!({"cause": e.to_string()})])
                };
                checks.insert("info_table".to_string(), check);
                None
            }
            Err(e) => return Err(e),
        };

        match version {
            Some(current) if current > max => {
                checks.insert(
                    "version_bounds".to_string(),
                    CheckResult::error(
                        Error::CurrentVersionOutOfBounds { current, max }.to_string(),
                    )
                    .with_details(vec![json!({"current": current, "max": max})]),
                );
            }
            Some(current) => {
                checks.insert(
                    "version_bounds".to_string(),
                    CheckResult::pass(format!("Version {} is within 0-{}", current, max)),
                );
                let pending = max - current;
                checks.insert(
                    "pending_migrations".to_string(),
                    if pending == 0 {
                        CheckResult::pass("Schema is at the latest version")
                    } else {
                        CheckResult::warning(format!("{} migration(s) pending", pending))
                            .with_details(vec![json!({"current": current, "max": max})])
                    },
                );
            }
            None => {}
        }

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary { passed, warnings, errors },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn pass(message: impl Into<String>) -> Self {
        Self::new("pass", message)
    }

    fn warning(message: impl Into<String>) -> Self {
        Self::new("warning", message)
    }

    fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }

    fn with_details(mut self, details: Vec<serde_json::Value>) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::migration::init_info_table;

    fn doctor(database: &Arc<Database>) -> DoctorService {
        DoctorService::new(Arc::clone(database), Migrator::default())
    }

    fn exec(db: &Database, sql: &str) {
        db.with_connection(|conn| Ok(conn.execute_batch(sql)?)).unwrap();
    }

    #[test]
    fn test_fresh_database_has_pending_migrations() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        init_info_table(&db).unwrap();

        let result = doctor(&db).run_checks().unwrap();

        assert_eq!(result.checks["info_table"].status, "pass");
        assert_eq!(result.checks["version_bounds"].status, "pass");
        assert_eq!(result.checks["pending_migrations"].status, "warning");
        assert_eq!(result.summary.errors, 0);
    }

    #[test]
    fn test_migrated_database_passes() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        init_info_table(&db).unwrap();
        Migrator::default().migrate_to_latest(&db).unwrap();

        let result = doctor(&db).run_checks().unwrap();

        assert_eq!(result.summary.passed, 3);
        assert_eq!(result.summary.warnings, 0);
        assert_eq!(result.summary.errors, 0);
    }

    #[test]
    fn test_uninitialized_database() {
        let db = Arc::new(Database::open_in_memory().unwrap());

        let result = doctor(&db).run_checks().unwrap();

        assert_eq!(result.checks["info_table"].status, "error");
        assert_eq!(result.checks["info_table"].message, "Migration info table is not initialized");
        assert!(!result.checks.contains_key("version_bounds"));
        assert_eq!(result.summary.errors, 1);
    }

    #[test]
    fn test_unreadable_version_reports_driver_error() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        exec(&db, "CREATE TABLE migration_info (version VARCHAR NOT NULL); INSERT INTO migration_info VALUES ('abc')");

        let result = doctor(&db).run_checks().unwrap();

        let check = &result.checks["info_table"];
        assert_eq!(check.status, "error");
        assert_ne!(check.message, "Migration info table is not initialized");
        assert!(check.details.is_none());
        assert!(!result.checks.contains_key("version_bounds"));
    }

    #[test]
    fn test_corrupted_version_record() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        init_info_table(&db).unwrap();
        exec(&db, "UPDATE migration_info SET version = 1000");

        let result = doctor(&db).run_checks().unwrap();
        assert_eq!(result.checks["version_bounds"].status, "error");

        exec(&db, "INSERT INTO migration_info(version) VALUES(0)");
        let result = doctor(&db).run_checks().unwrap();
        assert_eq!(result.checks["info_table"].message, "migration info table contain multiple rows");
    }

    #[test]
    fn test_closed_database_aborts() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.close().unwrap();

        assert!(matches!(doctor(&db).run_checks(), Err(Error::DatabaseClosed)));
    }
}
