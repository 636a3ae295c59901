//! Ordered schema scripts and the runner that applies them.
//!
//! # Invariants
//! - `version` values are strictly increasing and never reused.
//! - Pending scripts apply in one transaction; a failure leaves the
//!   previous `user_version` and schema untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "release_environments",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file is ahead of this binary.
/// - `DbError::MigrationFailed` naming the script that could not run.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    run_migrations(conn, MIGRATIONS)
}

fn run_migrations(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let from_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let target_version = migrations.last().map_or(0, |migration| migration.version);

    if from_version > target_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: target_version,
        });
    }

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        let script = format!(
            "{}\nPRAGMA user_version = {};",
            migration.sql, migration.version
        );
        tx.execute_batch(&script)
            .map_err(|source| DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            })?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={target_version} applied={}",
        pending.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run_migrations, Migration};
    use crate::db::DbError;
    use rusqlite::Connection;

    const BROKEN: &[Migration] = &[
        Migration {
            version: 1,
            name: "widgets",
            sql: "CREATE TABLE widgets (id INTEGER PRIMARY KEY);",
        },
        Migration {
            version: 2,
            name: "typo",
            sql: "CREATE TABLE;",
        },
    ];

    fn user_version(conn: &Connection) -> u32 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("user_version should be readable")
    }

    #[test]
    fn failing_script_is_named_and_rolls_back_batch() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");

        let err = run_migrations(&mut conn, BROKEN).expect_err("broken script must fail");

        match err {
            DbError::MigrationFailed { version, name, .. } => {
                assert_eq!(version, 2);
                assert_eq!(name, "typo");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(user_version(&conn), 0);
        let widgets: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'widgets';",
                [],
                |row| row.get(0),
            )
            .expect("sqlite_master should be readable");
        assert_eq!(widgets, 0);
    }

    #[test]
    fn only_pending_scripts_run() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");
        run_migrations(&mut conn, &BROKEN[..1]).expect("first script should apply");
        assert_eq!(user_version(&conn), 1);

        // Re-running would fail on the existing table if version 1 ran again.
        run_migrations(&mut conn, &BROKEN[..1]).expect("up-to-date db is a no-op");
        assert_eq!(user_version(&conn), 1);
    }
}
