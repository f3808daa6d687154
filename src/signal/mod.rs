//! Signal-timing pipeline: event cleanup, cycle reconstruction and green
//! occupancy.
//!
//! Data flows `normalize` → `reconstruct` → `green_ratio`. Groups are keyed
//! by `(region, node, phase)` and never interact, so reconstruction runs on
//! the batch worker pool.

pub mod green_ratio;
pub mod normalize;
pub mod reconstruct;
pub mod types;

use anyhow::Result;
use tracing::info;

use crate::batch::{CancelFlag, run_groups};
use crate::config::SignalConfig;
use green_ratio::green_ratios;
use normalize::normalize;
use reconstruct::reconstruct_group;
use types::{GreenRatioRecord, RawSignalEvent};

/// Runs the full signal pipeline over decoded events.
///
/// Records come back ordered by group key, then by cycle start.
#[tracing::instrument(skip(raw, config, cancel), fields(events = raw.len()))]
pub async fn green_ratio_pipeline(
    raw: &[RawSignalEvent],
    config: &SignalConfig,
    concurrency: usize,
    cancel: &CancelFlag,
) -> Result<Vec<GreenRatioRecord>> {
    let groups = normalize(raw, config);
    let worker_config = config.clone();

    let outcome = run_groups(groups, concurrency, cancel, move |key, events| {
        let cycles = reconstruct_group(key, &events, &worker_config);
        green_ratios(key, &cycles, &worker_config)
    })
    .await?;

    let records: Vec<GreenRatioRecord> = outcome.results.into_values().flatten().collect();
    let with_ratio = records.iter().filter(|r| r.green_ratio.is_some()).count();

    info!(
        records = records.len(),
        with_ratio,
        skipped_groups = outcome.skipped,
        "Green ratio pipeline finished"
    );

    Ok(records)
}
