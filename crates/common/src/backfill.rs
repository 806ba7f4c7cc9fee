//! One-shot encryption backfill over rows that still hold plaintext.
//!
//! # Phases
//!
//! 1. **Snapshot.** `CREATE TABLE <table>_backup_<YYYYMMDD_HHMMSS> AS SELECT *
//!    FROM <table>`. Committed before anything is mutated; if it fails the run
//!    aborts with nothing changed.
//! 2. **Mutate.** Every row with `sealed = 0` is sealed field by field and
//!    written back together with `sealed = 1` in one statement. A row that
//!    fails is logged, counted, and left as plaintext; the run continues.
//!
//! Because rows are selected and updated by `sealed = 0`, re-running the
//! backfill only touches rows that are still plaintext.

use chrono::{DateTime, Utc};
use rusqlite::params;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::{FieldCodec, FieldError, SealedValue};
use crate::store::{
    activities::{DESCRIPTION_FIELD, NOTES_FIELD},
    ensure_sealed_marker, validate_identifier, Database, StoreError,
};

/// Progress is logged after this many successful rows.
pub const PROGRESS_EVERY: usize = 100;

/// A row whose protected fields are still plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRow {
    pub id: i64,
    pub description: String,
    pub notes: String,
}

/// Storage collaborator of the backfill.
pub trait BackfillStore {
    /// Name of the table being migrated.
    fn table(&self) -> &str;

    /// Copy the whole table into `backup_table`, returning the copied row count.
    fn snapshot(&self, backup_table: &str) -> Result<usize, StoreError>;

    /// Rows still holding plaintext, in id order.
    fn unsealed_rows(&self) -> Result<Vec<LegacyRow>, StoreError>;

    /// Replace a row's protected fields with sealed tokens and mark it sealed.
    fn write_sealed(
        &self,
        id: i64,
        description: &SealedValue,
        notes: &SealedValue,
    ) -> Result<(), StoreError>;
}

/// Seals one protected field value.
#[cfg_attr(test, mockall::automock)]
pub trait Sealer {
    fn seal(&self, field: &'static str, plaintext: &str) -> Result<SealedValue, FieldError>;
}

impl Sealer for FieldCodec {
    fn seal(&self, field: &'static str, plaintext: &str) -> Result<SealedValue, FieldError> {
        FieldCodec::seal(self, field, plaintext)
    }
}

/// Failure of a single row; recovered locally by skip-and-count.
#[derive(Debug, Error)]
pub enum MigrationRowError {
    #[error("row {id}: {source}")]
    Seal {
        id: i64,
        #[source]
        source: FieldError,
    },

    #[error("row {id}: failed to write sealed values")]
    Write {
        id: i64,
        #[source]
        source: StoreError,
    },
}

impl MigrationRowError {
    pub fn row_id(&self) -> i64 {
        match self {
            MigrationRowError::Seal { id, .. } | MigrationRowError::Write { id, .. } => *id,
        }
    }
}

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("failed to create backup table {table}")]
    Snapshot {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read rows to migrate")]
    Scan(#[source] StoreError),
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct BackfillReport {
    pub backup_table: String,
    /// Rows copied into the backup table.
    pub backed_up: usize,
    /// Plaintext rows found.
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<MigrationRowError>,
}

impl BackfillReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// `<table>_backup_<YYYYMMDD_HHMMSS>`.
pub fn backup_table_name(table: &str, at: DateTime<Utc>) -> String {
    format!("{table}_backup_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Run both phases against `store`, sealing with `sealer`.
///
/// # Errors
///
/// Returns [`BackfillError`] only if the snapshot or the initial scan fails.
/// Per-row failures are reported in [`BackfillReport::failures`].
pub fn run<S, C>(store: &S, sealer: &C, now: DateTime<Utc>) -> Result<BackfillReport, BackfillError>
where
    S: BackfillStore + ?Sized,
    C: Sealer + ?Sized,
{
    let backup_table = backup_table_name(store.table(), now);
    info!(table = store.table(), backup = %backup_table, "creating backup table");
    let backed_up = store
        .snapshot(&backup_table)
        .map_err(|source| BackfillError::Snapshot {
            table: backup_table.clone(),
            source,
        })?;
    info!(backup = %backup_table, rows = backed_up, "backup created");

    let rows = store.unsealed_rows().map_err(BackfillError::Scan)?;
    let total = rows.len();
    info!(total, "found plaintext rows to encrypt");

    let mut succeeded = 0;
    let mut failures = Vec::new();

    for row in rows {
        match migrate_row(store, sealer, &row) {
            Ok(()) => {
                succeeded += 1;
                if is_progress_point(succeeded) {
                    info!(succeeded, total, "backfill progress");
                }
            }
            Err(e) => {
                warn!(row = e.row_id(), error = %e, "row left unencrypted");
                failures.push(e);
            }
        }
    }

    let report = BackfillReport {
        backup_table,
        backed_up,
        total,
        succeeded,
        failures,
    };
    info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed(),
        backup = %report.backup_table,
        "backfill complete"
    );
    Ok(report)
}

fn is_progress_point(succeeded: usize) -> bool {
    succeeded > 0 && succeeded % PROGRESS_EVERY == 0
}

fn migrate_row<S, C>(store: &S, sealer: &C, row: &LegacyRow) -> Result<(), MigrationRowError>
where
    S: BackfillStore + ?Sized,
    C: Sealer + ?Sized,
{
    let seal = |field, plaintext: &str| {
        sealer
            .seal(field, plaintext)
            .map_err(|source| MigrationRowError::Seal { id: row.id, source })
    };
    let description = seal(DESCRIPTION_FIELD, &row.description)?;
    let notes = seal(NOTES_FIELD, &row.notes)?;
    store
        .write_sealed(row.id, &description, &notes)
        .map_err(|source| MigrationRowError::Write { id: row.id, source })
}

/// [`BackfillStore`] over a SQLite table with `id`, `description`, `notes`,
/// and `sealed` columns.
#[derive(Debug, Clone)]
pub struct SqliteBackfillStore {
    db: Database,
    table: String,
}

impl SqliteBackfillStore {
    /// Bind to `table`, adding the `sealed` marker column if it is missing.
    pub fn new(db: Database, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        ensure_sealed_marker(&db.connection(), &table)?;
        Ok(Self { db, table })
    }
}

impl BackfillStore for SqliteBackfillStore {
    fn table(&self) -> &str {
        &self.table
    }

    fn snapshot(&self, backup_table: &str) -> Result<usize, StoreError> {
        validate_identifier(backup_table)?;
        let conn = self.db.connection();
        conn.execute_batch(&format!(
            "CREATE TABLE {backup_table} AS SELECT * FROM {}",
            self.table
        ))?;
        let rows: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {backup_table}"), [], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(rows).unwrap_or_default())
    }

    fn unsealed_rows(&self) -> Result<Vec<LegacyRow>, StoreError> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, description, COALESCE(notes, '') FROM {} WHERE sealed = 0 ORDER BY id",
            self.table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LegacyRow {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    notes: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn write_sealed(
        &self,
        id: i64,
        description: &SealedValue,
        notes: &SealedValue,
    ) -> Result<(), StoreError> {
        let changed = self.db.connection().execute(
            &format!(
                "UPDATE {} SET description = ?1, notes = ?2, sealed = 1 WHERE id = ?3 AND sealed = 0",
                self.table
            ),
            params![description.as_str(), notes.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "plaintext row", id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::crypto::{generate_key, AeadCipher, CipherError, KeyMaterial, StoredText};
    use crate::store::ActivityStore;

    fn codec() -> FieldCodec {
        let key = KeyMaterial::from_base64(&generate_key()).unwrap();
        FieldCodec::new(Arc::new(AeadCipher::new(key)))
    }

    fn seed_legacy(db: &Database, rows: &[(&str, &str)]) {
        let conn = db.connection();
        for (description, notes) in rows {
            conn.execute(
                "INSERT INTO activities (user_id, description, notes, sealed, created_at, updated_at)
                 VALUES (1, ?1, ?2, 0, ?3, ?3)",
                params![description, notes, Utc::now()],
            )
            .unwrap();
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn backup_name_uses_timestamp_pattern() {
        assert_eq!(
            backup_table_name("activities", fixed_time()),
            "activities_backup_20250314_092653"
        );
    }

    #[test]
    fn one_failing_row_is_skipped_and_counted() {
        let db = Database::open_in_memory().unwrap();
        seed_legacy(&db, &[("gym", ""), ("boom", "fails"), ("read", "chapter 3")]);
        let store = SqliteBackfillStore::new(db.clone(), "activities").unwrap();

        let real = codec();
        let delegate = real.clone();
        let mut sealer = MockSealer::new();
        sealer.expect_seal().returning(move |field, plaintext| {
            if plaintext == "boom" {
                Err(FieldError::Seal {
                    field,
                    source: CipherError::EncryptionFailed,
                })
            } else {
                delegate.seal(field, plaintext)
            }
        });

        let report = run(&store, &sealer, fixed_time()).unwrap();
        assert_eq!(report.backup_table, "activities_backup_20250314_092653");
        assert_eq!(report.backed_up, 3);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].row_id(), 2);

        // Backup holds the three original plaintext rows.
        let backup: Vec<String> = {
            let conn = db.connection();
            let mut stmt = conn
                .prepare("SELECT description FROM activities_backup_20250314_092653 ORDER BY id")
                .unwrap();
            let rows = stmt
                .query_map([], |r| r.get(0))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            rows
        };
        assert_eq!(backup, vec!["gym", "boom", "read"]);

        // Two rows sealed in place, one left as plaintext.
        let activities = ActivityStore::new(db.clone(), real);
        let gym = activities.stored(1).unwrap().unwrap();
        assert!(gym.description.is_sealed());
        assert_ne!(gym.description.as_stored(), "gym");
        assert_eq!(activities.get(1).unwrap().unwrap().description, "gym");
        assert_eq!(activities.get(3).unwrap().unwrap().notes, "chapter 3");

        let boom = activities.stored(2).unwrap().unwrap();
        assert_eq!(boom.description, StoredText::Plain("boom".into()));
    }

    #[test]
    fn rerun_only_touches_remaining_plaintext() {
        let db = Database::open_in_memory().unwrap();
        seed_legacy(&db, &[("a", ""), ("b", "")]);
        let store = SqliteBackfillStore::new(db.clone(), "activities").unwrap();
        let codec = codec();

        let first = run(&store, &codec, fixed_time()).unwrap();
        assert_eq!(first.succeeded, 2);
        let sealed_before = ActivityStore::new(db.clone(), codec.clone())
            .stored(1)
            .unwrap()
            .unwrap();

        let later = fixed_time() + chrono::Duration::seconds(1);
        let second = run(&store, &codec, later).unwrap();
        assert_eq!(second.total, 0);
        assert_eq!(second.succeeded, 0);

        let activities = ActivityStore::new(db, codec);
        assert_eq!(activities.stored(1).unwrap().unwrap(), sealed_before);
        assert_eq!(activities.get(1).unwrap().unwrap().description, "a");
    }

    #[test]
    fn snapshot_failure_aborts_before_mutation() {
        let db = Database::open_in_memory().unwrap();
        seed_legacy(&db, &[("keep me", "")]);
        let store = SqliteBackfillStore::new(db.clone(), "activities").unwrap();
        let codec = codec();

        // Occupy the backup name so the snapshot collides.
        db.connection()
            .execute_batch("CREATE TABLE activities_backup_20250314_092653 (x INTEGER)")
            .unwrap();

        let err = run(&store, &codec, fixed_time()).unwrap_err();
        assert!(matches!(err, BackfillError::Snapshot { .. }));
        let still_plain = ActivityStore::new(db, codec).stored(1).unwrap().unwrap();
        assert_eq!(still_plain.description, StoredText::Plain("keep me".into()));
    }

    #[test]
    fn write_failure_is_counted_per_row() {
        struct VanishingRows;

        impl BackfillStore for VanishingRows {
            fn table(&self) -> &str {
                "activities"
            }
            fn snapshot(&self, _: &str) -> Result<usize, StoreError> {
                Ok(2)
            }
            fn unsealed_rows(&self) -> Result<Vec<LegacyRow>, StoreError> {
                Ok(vec![
                    LegacyRow { id: 1, description: "x".into(), notes: String::new() },
                    LegacyRow { id: 2, description: "y".into(), notes: String::new() },
                ])
            }
            fn write_sealed(
                &self,
                id: i64,
                _: &SealedValue,
                _: &SealedValue,
            ) -> Result<(), StoreError> {
                if id == 2 {
                    Err(StoreError::NotFound { entity: "plaintext row", id })
                } else {
                    Ok(())
                }
            }
        }

        let report = run(&VanishingRows, &codec(), fixed_time()).unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(matches!(
            report.failures.as_slice(),
            [MigrationRowError::Write { id: 2, .. }]
        ));
    }

    #[test]
    fn progress_is_reported_every_hundred_successes() {
        let points: Vec<usize> = (0..=250).filter(|&n| is_progress_point(n)).collect();
        assert_eq!(points, vec![100, 200]);
    }

    #[test]
    fn large_run_counts_across_progress_boundary() {
        // Row 100 fails, so the hundredth success is row 101.
        let db = Database::open_in_memory().unwrap();
        let descriptions: Vec<String> = (1..=250).map(|i| format!("entry {i}")).collect();
        let rows: Vec<(&str, &str)> = descriptions.iter().map(|d| (d.as_str(), "")).collect();
        seed_legacy(&db, &rows);
        let store = SqliteBackfillStore::new(db.clone(), "activities").unwrap();

        let delegate = codec();
        let mut sealer = MockSealer::new();
        sealer.expect_seal().returning(move |field, plaintext| {
            if plaintext == "entry 100" {
                Err(FieldError::Seal {
                    field,
                    source: CipherError::EncryptionFailed,
                })
            } else {
                delegate.seal(field, plaintext)
            }
        });

        let report = run(&store, &sealer, fixed_time()).unwrap();
        assert_eq!(report.backed_up, 250);
        assert_eq!(report.total, 250);
        assert_eq!(report.succeeded, 249);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].row_id(), 100);

        let remaining = store.unsealed_rows().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].description, "entry 100");
    }

    #[test]
    fn rejects_unsafe_table_name() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            SqliteBackfillStore::new(db, "activities;--"),
            Err(StoreError::InvalidTableName(_))
        ));
    }
}
