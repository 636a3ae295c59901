//! Release environment store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide point lookups by natural key, insert with uniqueness
//!   enforcement, and conditional `last_seen` updates.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Listing reads return rows in ascending `id` order.
//! - `touch_last_seen` never moves `last_seen` backwards.

use crate::db::DbError;
use crate::model::release_environment::{
    NewReleaseEnvironment, ReleaseEnvironment, ReleaseEnvironmentId,
};
use rusqlite::{params, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const RELEASE_ENVIRONMENT_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    project_id,
    release_id,
    environment_id,
    first_seen,
    last_seen
FROM release_environments";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for association persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Another writer already created a row with the same natural key.
    UniqueViolation(String),
    NotFound(ReleaseEnvironmentId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UniqueViolation(message) => write!(f, "unique constraint violated: {message}"),
            Self::NotFound(id) => write!(f, "release environment not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted release environment data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UniqueViolation(_) | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::UniqueViolation(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store contract required by the resolver.
pub trait ReleaseEnvironmentRepository {
    /// Lists every row for release + organization + environment, any project.
    fn find_by_key(
        &self,
        release_id: u32,
        organization_id: u32,
        environment_id: u32,
    ) -> RepoResult<Vec<ReleaseEnvironment>>;

    /// Point lookup used while holding the creation lock.
    ///
    /// Returns the lowest-id match when several sibling rows exist.
    fn find_exact(
        &self,
        release_id: u32,
        organization_id: u32,
        environment_id: u32,
    ) -> RepoResult<Option<ReleaseEnvironment>>;

    /// Inserts a new row.
    ///
    /// # Errors
    /// - `RepoError::UniqueViolation` when the natural key already exists.
    fn insert(&self, new: &NewReleaseEnvironment) -> RepoResult<ReleaseEnvironment>;

    /// Sets `last_seen = new_value` only when the stored value is strictly
    /// older than `older_than`. Returns affected row count (0 or 1).
    fn touch_last_seen(
        &self,
        id: ReleaseEnvironmentId,
        older_than: i64,
        new_value: i64,
    ) -> RepoResult<usize>;
}

/// SQLite-backed association store.
pub struct SqliteReleaseEnvironmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReleaseEnvironmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads one row by id.
    pub fn get(&self, id: ReleaseEnvironmentId) -> RepoResult<ReleaseEnvironment> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{RELEASE_ENVIRONMENT_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_release_environment_row(row),
            None => Err(RepoError::NotFound(id)),
        }
    }
}

impl ReleaseEnvironmentRepository for SqliteReleaseEnvironmentRepository<'_> {
    fn find_by_key(
        &self,
        release_id: u32,
        organization_id: u32,
        environment_id: u32,
    ) -> RepoResult<Vec<ReleaseEnvironment>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{RELEASE_ENVIRONMENT_SELECT_SQL}
             WHERE release_id = ?1
               AND organization_id = ?2
               AND environment_id = ?3
             ORDER BY id ASC;"
        ))?;

        let mut rows = stmt.query(params![release_id, organization_id, environment_id])?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            found.push(parse_release_environment_row(row)?);
        }

        Ok(found)
    }

    fn find_exact(
        &self,
        release_id: u32,
        organization_id: u32,
        environment_id: u32,
    ) -> RepoResult<Option<ReleaseEnvironment>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{RELEASE_ENVIRONMENT_SELECT_SQL}
             WHERE release_id = ?1
               AND organization_id = ?2
               AND environment_id = ?3
             ORDER BY id ASC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query(params![release_id, organization_id, environment_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_release_environment_row(row)?));
        }

        Ok(None)
    }

    fn insert(&self, new: &NewReleaseEnvironment) -> RepoResult<ReleaseEnvironment> {
        if new.last_seen < new.first_seen {
            return Err(RepoError::InvalidData(format!(
                "last_seen {} precedes first_seen {}",
                new.last_seen, new.first_seen
            )));
        }

        self.conn.execute(
            "INSERT INTO release_environments (
                organization_id,
                project_id,
                release_id,
                environment_id,
                first_seen,
                last_seen
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                new.key.organization_id,
                new.key.project_id,
                new.key.release_id,
                new.key.environment_id,
                new.first_seen,
                new.last_seen,
            ],
        )?;

        Ok(ReleaseEnvironment {
            id: self.conn.last_insert_rowid(),
            organization_id: new.key.organization_id,
            project_id: new.key.project_id,
            release_id: new.key.release_id,
            environment_id: new.key.environment_id,
            first_seen: new.first_seen,
            last_seen: new.last_seen,
        })
    }

    fn touch_last_seen(
        &self,
        id: ReleaseEnvironmentId,
        older_than: i64,
        new_value: i64,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE release_environments
             SET last_seen = ?1
             WHERE id = ?2
               AND last_seen < ?3;",
            params![new_value, id, older_than],
        )?;

        Ok(changed)
    }
}

fn parse_release_environment_row(row: &Row<'_>) -> RepoResult<ReleaseEnvironment> {
    let record = ReleaseEnvironment {
        id: row.get("id")?,
        organization_id: row.get("organization_id")?,
        project_id: row.get("project_id")?,
        release_id: row.get("release_id")?,
        environment_id: row.get("environment_id")?,
        first_seen: row.get("first_seen")?,
        last_seen: row.get("last_seen")?,
    };

    if record.last_seen < record.first_seen {
        return Err(RepoError::InvalidData(format!(
            "row {} has last_seen {} before first_seen {}",
            record.id, record.last_seen, record.first_seen
        )));
    }

    Ok(record)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
