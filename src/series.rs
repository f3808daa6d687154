//! Loading and preparing joined demand/capacity series.
//!
//! Input is a CSV with columns `time_bin, direction, movement,
//! smoothed_demand, cleaned_capacity`. Missing or non-finite numbers become
//! zero, since the upstream rolling mean leaves gaps at both ends of a
//! series. Rows are filtered to an analysis window and an optional
//! direction/movement, then grouped and sorted for the sequential folds.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use tracing::{debug, info, warn};

use crate::resilience::MovementGroups;
use crate::resilience::types::{MovementSeriesRow, time_bin_format};

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    #[serde(with = "time_bin_format")]
    time_bin: NaiveDateTime,
    direction: String,
    movement: String,
    smoothed_demand: Option<f64>,
    cleaned_capacity: Option<f64>,
}

fn sanitize(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0)
}

impl From<SeriesRecord> for MovementSeriesRow {
    fn from(r: SeriesRecord) -> Self {
        MovementSeriesRow {
            time_bin: r.time_bin,
            direction: r.direction.trim().to_string(),
            movement: r.movement.trim().to_string(),
            smoothed_demand: sanitize(r.smoothed_demand),
            cleaned_capacity: sanitize(r.cleaned_capacity),
        }
    }
}

/// Reads series rows from any CSV source. Rows that fail to deserialize are
/// skipped with a warning.
pub fn read_series<R: Read>(reader: R) -> Result<Vec<MovementSeriesRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    let mut rejected = 0usize;

    for (idx, result) in rdr.deserialize::<SeriesRecord>().enumerate() {
        match result {
            Ok(record) => rows.push(record.into()),
            Err(e) => {
                rejected += 1;
                warn!(row = idx + 1, error = %e, "Skipping unreadable series row");
            }
        }
    }

    debug!(rows = rows.len(), rejected, "Series rows read");
    Ok(rows)
}

/// Loads a series CSV from disk.
#[tracing::instrument]
pub fn load_series(path: &str) -> Result<Vec<MovementSeriesRow>> {
    let file = File::open(path).with_context(|| format!("failed to open series CSV '{path}'"))?;
    read_series(file)
}

/// Which rows of a series take part in an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesFilter {
    /// Inclusive lower bound on `time_bin`.
    pub begin: Option<NaiveDateTime>,
    /// Inclusive upper bound on `time_bin`.
    pub end: Option<NaiveDateTime>,
    pub direction: Option<String>,
    pub movement: Option<String>,
}

impl SeriesFilter {
    /// Builds a filter, splitting a combined `D-M` direction and expanding
    /// movement short codes.
    pub fn new(
        begin: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        direction: Option<&str>,
        movement: Option<&str>,
    ) -> Self {
        let (direction, movement) = normalize_direction_movement(direction, movement);
        Self {
            begin,
            end,
            direction,
            movement,
        }
    }

    pub fn matches(&self, row: &MovementSeriesRow) -> bool {
        self.begin.is_none_or(|b| row.time_bin >= b)
            && self.end.is_none_or(|e| row.time_bin <= e)
            && self.direction.as_deref().is_none_or(|d| row.direction == d)
            && self.movement.as_deref().is_none_or(|m| row.movement == m)
    }
}

/// Expands movement short codes (`L`, `T`, `R` and friends) to the names
/// used in series files.
pub fn expand_movement(movement: &str) -> String {
    let m = movement.trim();
    match m.to_ascii_uppercase().as_str() {
        "L" | "LT" => "Left Turn".to_string(),
        "T" | "TH" => "Through".to_string(),
        "R" | "RT" => "Right Turn".to_string(),
        _ => m.to_string(),
    }
}

/// Normalizes a direction/movement selection.
///
/// A direction written as `S-L` carries its movement when no movement is
/// given separately. Empty values and `-1` mean "all".
pub fn normalize_direction_movement(
    direction: Option<&str>,
    movement: Option<&str>,
) -> (Option<String>, Option<String>) {
    let selected = |v: Option<&str>| {
        v.map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-1")
            .map(str::to_string)
    };

    let mut direction = selected(direction);
    let mut movement = selected(movement);

    if movement.is_none() {
        if let Some((d, m)) = direction.as_deref().and_then(|d| d.split_once('-')) {
            let (d, m) = (d.trim(), m.trim());
            if !m.is_empty() {
                movement = Some(m.to_string());
            }
            if !d.is_empty() {
                direction = Some(d.to_string());
            }
        }
    }

    (direction, movement.map(|m| expand_movement(&m)))
}

/// Applies `filter` and groups rows by `(direction, movement)`.
///
/// Each group is sorted by time bin; a repeated time bin keeps its first row.
pub fn group_series(rows: Vec<MovementSeriesRow>, filter: &SeriesFilter) -> MovementGroups {
    let total = rows.len();
    let mut groups: MovementGroups = BTreeMap::new();

    for row in rows.into_iter().filter(|r| filter.matches(r)) {
        groups.entry(row.key()).or_default().push(row);
    }

    let mut duplicates = 0usize;
    for (key, rows) in groups.iter_mut() {
        rows.sort_by_key(|r| r.time_bin);
        let before = rows.len();
        rows.dedup_by_key(|r| r.time_bin);
        if rows.len() != before {
            duplicates += before - rows.len();
            warn!(group = %key, dropped = before - rows.len(), "Duplicate time bins dropped");
        }
    }

    let kept: usize = groups.values().map(Vec::len).sum();
    info!(
        total,
        kept,
        duplicates,
        groups = groups.len(),
        "Series grouped by movement"
    );

    groups
}
