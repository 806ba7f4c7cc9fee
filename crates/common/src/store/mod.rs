//! SQLite persistence for users and activities.
//!
//! # Responsibilities
//!
//! - Open the database and bootstrap the schema.
//! - Map users and activities to and from rows.
//! - Seal protected activity columns on write and open them on read via
//!   [`FieldCodec`](crate::crypto::FieldCodec); nothing above this module sees a
//!   sealed token.
//!
//! # Module invariants
//!
//! - Every activity row written here carries `sealed = 1`.
//! - Table names interpolated into SQL are validated by [`validate_identifier`].

pub mod activities;
pub mod users;

pub use activities::{Activity, ActivityStore, StoredActivity};

use std::{path::Path, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, ToSql,
};
use thiserror::Error;
use tracing::info;

use crate::crypto::FieldError;
use crate::identity::Role;

/// Errors produced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    picture       TEXT NOT NULL DEFAULT '',
    google_id     TEXT NOT NULL UNIQUE,
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    last_login_at TEXT,
    deleted_at    TEXT
);

CREATE TABLE IF NOT EXISTS activities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    description TEXT NOT NULL,
    notes       TEXT NOT NULL DEFAULT '',
    sealed      INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS activities_user_id ON activities(user_id);
";

/// Shared handle to the SQLite connection.
///
/// Cheap to clone; all clones serialise on the same connection mutex.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path` and bootstrap the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "database opened");
        Self::init(conn)
    }

    /// Open a private in-memory database. Used by tests and tooling.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        ensure_sealed_marker(&conn, "activities")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for direct SQL access.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Returns `true` if the database answers a trivial query.
    pub fn ping(&self) -> bool {
        self.connection()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}

/// Add the `sealed` marker column to a table created before it existed.
///
/// Pre-existing rows default to `0`: they hold plaintext until the backfill
/// reaches them.
pub(crate) fn ensure_sealed_marker(conn: &Connection, table: &str) -> Result<(), StoreError> {
    validate_identifier(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    if !columns.iter().any(|c| c == "sealed") {
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN sealed INTEGER NOT NULL DEFAULT 0"
        ))?;
        info!(table, "added sealed marker column");
    }
    Ok(())
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*` before it is interpolated
/// into SQL.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_owned()))
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_bootstraps_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ping());
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(validate_identifier("activities").is_ok());
        assert!(validate_identifier("activities_backup_20250101_120000").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("activities; DROP TABLE users").is_err());
        assert!(validate_identifier("a-b").is_err());
    }

    #[test]
    fn legacy_table_gains_sealed_marker() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE activities (id INTEGER PRIMARY KEY, user_id INTEGER, description TEXT, notes TEXT);
             INSERT INTO activities (id, user_id, description, notes) VALUES (1, 1, 'old', '');",
        )
        .unwrap();
        ensure_sealed_marker(&conn, "activities").unwrap();
        let sealed: i64 = conn
            .query_row("SELECT sealed FROM activities WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sealed, 0);
        // Idempotent.
        ensure_sealed_marker(&conn, "activities").unwrap();
    }

    #[test]
    fn role_column_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (role TEXT)").unwrap();
        conn.execute("INSERT INTO t (role) VALUES (?1)", [Role::Superadmin])
            .unwrap();
        let role: Role = conn.query_row("SELECT role FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(role, Role::Superadmin);

        conn.execute("INSERT INTO t (role) VALUES ('root')", []).unwrap();
        let bad = conn.query_row("SELECT role FROM t WHERE role = 'root'", [], |r| {
            r.get::<_, Role>(0)
        });
        assert!(bad.is_err());
    }
}
