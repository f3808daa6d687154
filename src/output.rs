//! Output formatting and persistence for result records.
//!
//! Supports pretty-printing, JSON logging, CSV append and CSV rewrite.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Logs records using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(records: &[T]) {
    for record in records {
        debug!("{:#?}", record);
    }
}

/// Logs records as pretty-printed JSON.
pub fn print_json<T: Serialize>(records: &[T]) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist, so repeated
/// runs over successive windows accumulate under one header.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    ensure_parent_dir(path)?;
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open '{path}' for append"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes records to a fresh CSV file, replacing any existing one.
pub fn write_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    debug!(path, rows = records.len(), "Writing CSV records");

    ensure_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(path, rows = records.len(), "CSV written");
    Ok(())
}

/// Creates the parent directory of `path` when it has one.
pub fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}
