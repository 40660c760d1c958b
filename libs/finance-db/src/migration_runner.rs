//! Versioned schema upgrades.
//!
//! Each database file keeps its own history table (`finance_migration_history`)
//! listing the steps already applied. Steps are `SeaORM` [`MigrationTrait`]
//! implementations, applied in name order. Every step runs in its own
//! transaction together with its history record, so a failed step leaves
//! neither schema changes nor a history entry behind and can simply be re-run.
//!
//! Opening a database at the version it is already at is a no-op: all steps
//! are found in the history and skipped.

use sea_orm::{ConnectionTrait, DbErr, FromQueryResult, Statement, TransactionTrait};
use sea_orm_migration::MigrationTrait;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::DbHandle;

/// History table present in every migrated database.
pub const MIGRATION_TABLE: &str = "finance_migration_history";

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to create migration table in '{database}': {source}")]
    CreateTable { database: String, source: DbErr },

    #[error("failed to query migration history in '{database}': {source}")]
    QueryHistory { database: String, source: DbErr },

    #[error("migration '{migration}' failed in '{database}': {source}")]
    MigrationFailed {
        database: String,
        migration: String,
        source: DbErr,
    },

    #[error("failed to record migration '{migration}' in '{database}': {source}")]
    RecordFailed {
        database: String,
        migration: String,
        source: DbErr,
    },

    #[error("duplicate migration name '{name}' for '{database}'")]
    DuplicateMigrationName { database: String, name: String },
}

/// Result of a migration run.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Number of migrations that were applied.
    pub applied: usize,
    /// Number of migrations that were skipped (already applied).
    pub skipped: usize,
    pub applied_names: Vec<String>,
}

#[derive(Debug, FromQueryResult)]
struct MigrationRecord {
    version: String,
}

async fn ensure_migration_table(
    conn: &impl ConnectionTrait,
    database: &str,
) -> Result<(), MigrationError> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{MIGRATION_TABLE}" (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#
    );

    conn.execute(Statement::from_string(conn.get_database_backend(), sql))
        .await
        .map_err(|e| MigrationError::CreateTable {
            database: database.to_owned(),
            source: e,
        })?;

    Ok(())
}

async fn get_applied_migrations(
    conn: &impl ConnectionTrait,
    database: &str,
) -> Result<HashSet<String>, MigrationError> {
    let sql = format!(r#"SELECT version FROM "{MIGRATION_TABLE}""#);

    let records: Vec<MigrationRecord> = MigrationRecord::find_by_statement(Statement::from_string(
        conn.get_database_backend(),
        sql,
    ))
    .all(conn)
    .await
    .map_err(|e| MigrationError::QueryHistory {
        database: database.to_owned(),
        source: e,
    })?;

    Ok(records.into_iter().map(|r| r.version).collect())
}

async fn record_migration(
    conn: &impl ConnectionTrait,
    database: &str,
    migration_name: &str,
) -> Result<(), MigrationError> {
    let sql = format!(r#"INSERT INTO "{MIGRATION_TABLE}" (version) VALUES (?)"#);

    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        &sql,
        [migration_name.into()],
    ))
    .await
    .map_err(|e| MigrationError::RecordFailed {
        database: database.to_owned(),
        migration: migration_name.to_owned(),
        source: e,
    })?;

    Ok(())
}

/// Apply every pending migration to `db`.
///
/// Duplicate names are rejected before anything runs. Steps are applied in
/// name order; already recorded steps are skipped.
///
/// # Errors
///
/// Returns `Err(MigrationError)` if the history table cannot be created or
/// read, or any migration step fails. Steps applied before the failing one
/// stay applied.
pub async fn run_migrations(
    db: &DbHandle,
    migrations: Vec<Box<dyn MigrationTrait>>,
) -> Result<MigrationResult, MigrationError> {
    run_migrations_on(db.conn(), db.name(), migrations).await
}

/// Same as [`run_migrations`] for a bare connection. `database` only labels logs and errors.
///
/// # Errors
///
/// See [`run_migrations`].
pub async fn run_migrations_on<C>(
    conn: &C,
    database: &str,
    migrations: Vec<Box<dyn MigrationTrait>>,
) -> Result<MigrationResult, MigrationError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if migrations.is_empty() {
        debug!(database, "No migrations to run");
        return Ok(MigrationResult {
            applied: 0,
            skipped: 0,
            applied_names: vec![],
        });
    }

    let mut seen = HashSet::new();
    for m in &migrations {
        let n = m.name().to_owned();
        if !seen.insert(n.clone()) {
            return Err(MigrationError::DuplicateMigrationName {
                database: database.to_owned(),
                name: n,
            });
        }
    }

    ensure_migration_table(conn, database).await?;
    let applied = get_applied_migrations(conn, database).await?;

    let mut sorted_migrations = migrations;
    sorted_migrations.sort_by(|a, b| a.name().cmp(b.name()));

    let mut result = MigrationResult {
        applied: 0,
        skipped: 0,
        applied_names: vec![],
    };

    for migration in sorted_migrations {
        let name = migration.name().to_owned();

        if applied.contains(&name) {
            debug!(database, migration = %name, "Migration already applied, skipping");
            result.skipped += 1;
            continue;
        }

        info!(database, migration = %name, "Applying migration");

        let failed = |e: DbErr| MigrationError::MigrationFailed {
            database: database.to_owned(),
            migration: name.clone(),
            source: e,
        };

        let txn = conn.begin().await.map_err(failed)?;

        let manager = sea_orm_migration::SchemaManager::new(&txn);
        let res: Result<(), MigrationError> = async {
            migration.up(&manager).await.map_err(failed)?;
            record_migration(&txn, database, &name).await
        }
        .await;

        match res {
            Ok(()) => txn.commit().await.map_err(failed)?,
            Err(err) => {
                _ = txn.rollback().await;
                return Err(err);
            }
        }

        result.applied += 1;
        result.applied_names.push(name);
    }

    info!(
        database,
        applied = result.applied,
        skipped = result.skipped,
        "Migration run complete"
    );

    Ok(result)
}

/// Names of the migrations not yet applied to `db`.
///
/// # Errors
///
/// Returns `Err(MigrationError)` if the migration history cannot be queried.
pub async fn pending_migrations(
    db: &DbHandle,
    migrations: &[Box<dyn MigrationTrait>],
) -> Result<Vec<String>, MigrationError> {
    let conn = db.conn();
    let database = db.name();

    let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?";
    let row = conn
        .query_one(Statement::from_sql_and_values(
            conn.get_database_backend(),
            sql,
            [MIGRATION_TABLE.into()],
        ))
        .await
        .map_err(|e| MigrationError::QueryHistory {
            database: database.to_owned(),
            source: e,
        })?;
    let table_exists = row
        .and_then(|r| r.try_get_by_index::<i64>(0).ok())
        .is_some_and(|c| c > 0);

    if !table_exists {
        return Ok(migrations.iter().map(|m| m.name().to_owned()).collect());
    }

    let applied = get_applied_migrations(conn, database).await?;

    let mut pending: Vec<String> = migrations
        .iter()
        .filter(|m| !applied.contains(m.name()))
        .map(|m| m.name().to_owned())
        .collect();
    pending.sort();
    Ok(pending)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::ConnectOpts;
    use sea_orm_migration::prelude::*;

    struct TestMigration {
        name: String,
        fail: bool,
    }

    impl TestMigration {
        fn boxed(name: &str) -> Box<dyn MigrationTrait> {
            Box::new(Self {
                name: name.to_owned(),
                fail: false,
            })
        }
    }

    impl MigrationName for TestMigration {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for TestMigration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let table_name = format!("test_{}", self.name);
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "CREATE TABLE IF NOT EXISTS \"{table_name}\" (id INTEGER PRIMARY KEY)"
                ))
                .await?;
            if self.fail {
                return Err(DbErr::Migration("forced failure".to_owned()));
            }
            Ok(())
        }

        async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
            Ok(())
        }
    }

    async fn table_exists(db: &DbHandle, table: &str) -> bool {
        let row = db
            .conn()
            .query_one(Statement::from_string(
                db.conn().get_database_backend(),
                format!("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{table}'"),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get_by_index::<i64>(0).unwrap() > 0
    }

    async fn setup() -> (tempfile::TempDir, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::open(dir.path(), "runner", &ConnectOpts::default())
            .await
            .expect("open test database");
        (dir, db)
    }

    #[tokio::test]
    async fn empty_list_is_noop() {
        let (_dir, db) = setup().await;
        let result = run_migrations(&db, vec![]).await.unwrap();
        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped, 0);
    }

    #[tokio::test]
    async fn applies_in_name_order_and_is_idempotent() {
        let (_dir, db) = setup().await;

        let result = run_migrations(
            &db,
            vec![
                TestMigration::boxed("m003_third"),
                TestMigration::boxed("m001_first"),
                TestMigration::boxed("m002_second"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            result.applied_names,
            vec!["m001_first", "m002_second", "m003_third"]
        );

        let again = run_migrations(
            &db,
            vec![
                TestMigration::boxed("m001_first"),
                TestMigration::boxed("m002_second"),
                TestMigration::boxed("m003_third"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(again.applied, 0);
        assert_eq!(again.skipped, 3);
    }

    #[tokio::test]
    async fn only_new_steps_run_on_upgrade() {
        let (_dir, db) = setup().await;
        run_migrations(&db, vec![TestMigration::boxed("m001_first")])
            .await
            .unwrap();

        let pending = pending_migrations(
            &db,
            &[
                TestMigration::boxed("m001_first"),
                TestMigration::boxed("m002_second"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(pending, vec!["m002_second"]);

        let result = run_migrations(
            &db,
            vec![
                TestMigration::boxed("m001_first"),
                TestMigration::boxed("m002_second"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(result.applied_names, vec!["m002_second"]);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn pending_on_fresh_database_lists_everything() {
        let (_dir, db) = setup().await;
        let pending = pending_migrations(&db, &[TestMigration::boxed("m001_first")])
            .await
            .unwrap();
        assert_eq!(pending, vec!["m001_first"]);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_before_running() {
        let (_dir, db) = setup().await;
        let err = run_migrations(
            &db,
            vec![
                TestMigration::boxed("m001_dup"),
                TestMigration::boxed("m001_dup"),
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateMigrationName { .. }));
        assert!(!table_exists(&db, "test_m001_dup").await);
    }

    #[tokio::test]
    async fn failed_step_is_rolled_back_and_not_recorded() {
        let (_dir, db) = setup().await;
        let failing: Box<dyn MigrationTrait> = Box::new(TestMigration {
            name: "m001_broken".to_owned(),
            fail: true,
        });

        let err = run_migrations(&db, vec![failing]).await.unwrap_err();
        assert!(matches!(err, MigrationError::MigrationFailed { .. }));
        assert!(!table_exists(&db, "test_m001_broken").await);

        let pending = pending_migrations(&db, &[TestMigration::boxed("m001_broken")])
            .await
            .unwrap();
        assert_eq!(pending, vec!["m001_broken"]);
    }
}
