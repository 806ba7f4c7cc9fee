//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::backfill::{self, BackfillReport, SqliteBackfillStore};
use common::crypto::{generate_key as new_key, AeadCipher, FieldCodec, KeyMaterial};
use common::store::Database;
use tracing::{info, warn};

use crate::config::Config;

/// `keytool generate-key`
pub fn generate_key() {
    let key = new_key();

    println!();
    println!("========== ENCRYPTION KEY ==========");
    println!("{key}");
    println!("====================================");
    println!();
    println!("Add this key to your environment as:");
    println!("ENCRYPTION_KEY={key}");
    println!();
    println!("IMPORTANT SECURITY NOTES:");
    println!("1. Keep this key secure! Anyone with this key can decrypt your data.");
    println!("2. Store a backup of this key in a secure location.");
    println!("3. If this key is lost, encrypted data cannot be recovered.");
}

/// `keytool encrypt-data`
pub fn encrypt_data(cfg: &Config) -> Result<()> {
    let key = KeyMaterial::from_base64(&cfg.encryption_key).context("ENCRYPTION_KEY rejected")?;
    let db = Database::open(&cfg.database_path)
        .with_context(|| format!("failed to open database at {}", cfg.database_path))?;

    let report = migrate(db, key, &cfg.backfill_table, Utc::now())?;
    print_summary(&report);
    Ok(())
}

/// Snapshot `table` and seal every plaintext row in it.
pub fn migrate(
    db: Database,
    key: KeyMaterial,
    table: &str,
    now: DateTime<Utc>,
) -> Result<BackfillReport> {
    let codec = FieldCodec::new(Arc::new(AeadCipher::new(key)));
    let store = SqliteBackfillStore::new(db, table)
        .with_context(|| format!("cannot prepare table {table} for backfill"))?;

    let report = backfill::run(&store, &codec, now)?;
    if report.failed() > 0 {
        warn!(
            failed = report.failed(),
            "some rows could not be encrypted and remain plaintext"
        );
    } else {
        info!("all plaintext rows encrypted");
    }
    Ok(report)
}

fn print_summary(report: &BackfillReport) {
    println!();
    println!("=========== ENCRYPTION COMPLETE ===========");
    println!("Rows backed up:          {}", report.backed_up);
    println!("Plaintext rows found:    {}", report.total);
    println!("Successfully encrypted:  {}", report.succeeded);
    println!("Failed to encrypt:       {}", report.failed());
    println!("Backup table:            {}", report.backup_table);
    println!("===========================================");

    if report.failed() > 0 {
        println!();
        println!("WARNING: some rows could not be encrypted and were left as plaintext:");
        for failure in &report.failures {
            println!("  row {}: {failure}", failure.row_id());
        }
        println!("Review them before re-running; only plaintext rows are retried.");
    } else {
        println!();
        println!("All plaintext rows were encrypted.");
    }

    println!();
    println!(
        "IMPORTANT: the backup table {} holds your original unencrypted data.",
        report.backup_table
    );
    println!("Drop it once you have verified the service reads every record correctly.");
}
