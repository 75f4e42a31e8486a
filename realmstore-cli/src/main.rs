//! Developer CLI for inspecting realmstore snapshot files.
//!
//! Read-only: every command operates on a snapshot file path passed as an
//! argument. `list` and `show` work from the persisted form so they can
//! display entries even when individual records would fail to decode;
//! `check` runs the real load path and reports what it would skip.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::{bail, Result, WrapErr};
use realmstore_core::persist::{PersistedTable, STATE_REGISTERED};
use realmstore_core::snapshot;

#[derive(Parser)]
#[command(name = "realmstore", about = "Inspect realmstore snapshot files", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List record identifiers and their registration state.
    List {
        /// Path to the snapshot file.
        snapshot: std::path::PathBuf,
    },
    /// Print the persisted JSON for a single record.
    Show {
        /// Path to the snapshot file.
        snapshot: std::path::PathBuf,
        /// Record identifier to show.
        id: String,
    },
    /// Decode every record and report malformed entries.
    Check {
        /// Path to the snapshot file.
        snapshot: std::path::PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::List { snapshot } => {
            list(&snapshot)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { snapshot, id } => {
            show(&snapshot, &id)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { snapshot } => {
            let skipped = check(&snapshot)?;
            if skipped == 0 {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn read_table(path: &Path) -> Result<PersistedTable> {
    let data =
        fs::read(path).wrap_err_with(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_slice(&data).wrap_err("parsing snapshot document")
}

fn list(path: &Path) -> Result<()> {
    let table = read_table(path)?;
    for (id, record) in &table.records {
        if record.registration_state == STATE_REGISTERED {
            if let Some(registered) = &record.registered {
                println!(
                    "{id}  {}  guesses {}/{}",
                    record.registration_state,
                    registered.guess_count,
                    registered.policy.num_guesses
                );
                continue;
            }
        }
        println!("{id}  {}", record.registration_state);
    }
    Ok(())
}

fn show(path: &Path, id: &str) -> Result<()> {
    let table = read_table(path)?;
    let Some(record) = table.records.get(id) else {
        bail!("no record {id:?} in {}", path.display());
    };
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// Runs the real load path and reports entries it would skip.
///
/// Returns the number of skipped entries.
fn check(path: &Path) -> Result<usize> {
    let loaded = snapshot::load(path)?;
    println!("{} record(s) decoded", loaded.records.len());
    for skipped in &loaded.skipped {
        eprintln!("malformed record {:?}: {}", skipped.id, skipped.reason);
    }
    if !loaded.skipped.is_empty() {
        eprintln!("{} record(s) would be skipped on load", loaded.skipped.len());
    }
    Ok(loaded.skipped.len())
}
