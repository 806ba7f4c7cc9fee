//! `keytool`: operator CLI for the field encryption key.
//!
//! - `generate-key` prints a fresh random key; it needs no configuration.
//! - `encrypt-data` loads [`config::Config`], initialises logging, backs up
//!   the target table and encrypts its plaintext rows in place.

mod cli;
mod commands;
mod config;
mod telemetry;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateKey => {
            commands::generate_key();
            Ok(())
        }
        Command::EncryptData => {
            // -------------------------------------------------------------------
            // 1. Configuration
            // -------------------------------------------------------------------
            let cfg = config::Config::from_env().map_err(|e| {
                eprintln!("ERROR: keytool configuration invalid: {e}");
                e
            })?;

            // -------------------------------------------------------------------
            // 2. Telemetry
            // -------------------------------------------------------------------
            telemetry::init(&cfg.log_level)?;

            // -------------------------------------------------------------------
            // 3. Backfill
            // -------------------------------------------------------------------
            commands::encrypt_data(&cfg)
        }
    }
}
