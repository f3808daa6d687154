//! Backlog simulation and resilience indices per `(direction, movement)`.
//!
//! Each movement series is folded through the backlog simulator, then the
//! resulting utilized supply is compared against demand to produce the
//! breakpoint indices and the separate gap-ratio metric.

pub mod backlog;
pub mod metrics;
pub mod ratio;
pub mod types;
pub mod utility;

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::batch::{CancelFlag, run_groups};
use crate::config::ResilienceConfig;
use backlog::simulate_backlog;
use metrics::resilience_indices;
use ratio::gap_ratio;
use types::{BacklogRow, MovementKey, MovementSeriesRow, ResilienceMetrics};

/// Movement series grouped by key, each sorted by time bin.
pub type MovementGroups = BTreeMap<MovementKey, Vec<MovementSeriesRow>>;

/// Computes the full metrics row for one movement series.
pub fn analyze_movement(
    key: &MovementKey,
    rows: &[MovementSeriesRow],
    config: &ResilienceConfig,
) -> ResilienceMetrics {
    let backlog = simulate_backlog(rows, config);
    let indices = resilience_indices(&backlog, config);
    let ratios = gap_ratio(&backlog, config);

    debug!(
        group = %key,
        samples = backlog.len(),
        general_resilience = indices.general_resilience,
        "Movement analyzed"
    );

    ResilienceMetrics {
        direction: key.direction.clone(),
        movement: key.movement.clone(),
        window_start: backlog.first().map(|r| r.time_bin),
        window_end: backlog.last().map(|r| r.time_bin),
        samples: backlog.len(),
        pr_preparation: indices.pr_preparation,
        or_operational: indices.or_operational,
        dr_design: indices.dr_design,
        rr_recovery: indices.rr_recovery,
        general_resilience: indices.general_resilience,
        gap_operational_ratio: ratios.operational_ratio,
        gap_peak_ratio: ratios.peak_ratio,
    }
}

/// Runs the backlog fold for every movement group.
#[tracing::instrument(skip(groups, config, cancel), fields(groups = groups.len()))]
pub async fn backlog_pipeline(
    groups: MovementGroups,
    config: &ResilienceConfig,
    concurrency: usize,
    cancel: &CancelFlag,
) -> Result<Vec<BacklogRow>> {
    let worker_config = config.clone();
    let outcome = run_groups(groups, concurrency, cancel, move |_, rows| {
        simulate_backlog(&rows, &worker_config)
    })
    .await?;

    let rows: Vec<BacklogRow> = outcome.results.into_values().flatten().collect();
    info!(rows = rows.len(), skipped_groups = outcome.skipped, "Backlog pipeline finished");
    Ok(rows)
}

/// Computes one [`ResilienceMetrics`] row per movement group.
#[tracing::instrument(skip(groups, config, cancel), fields(groups = groups.len()))]
pub async fn resilience_pipeline(
    groups: MovementGroups,
    config: &ResilienceConfig,
    concurrency: usize,
    cancel: &CancelFlag,
) -> Result<Vec<ResilienceMetrics>> {
    let worker_config = config.clone();
    let outcome = run_groups(groups, concurrency, cancel, move |key, rows| {
        analyze_movement(key, &rows, &worker_config)
    })
    .await?;

    let metrics: Vec<ResilienceMetrics> = outcome.results.into_values().collect();
    let disrupted = metrics.iter().filter(|m| m.general_resilience > 0.0).count();
    info!(
        movements = metrics.len(),
        disrupted,
        skipped_groups = outcome.skipped,
        "Resilience pipeline finished"
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn group(direction: &str, movement: &str, demand: &[f64], capacity: &[f64]) -> (MovementKey, Vec<MovementSeriesRow>) {
        let key = MovementKey {
            direction: direction.to_string(),
            movement: movement.to_string(),
        };
        let rows = demand
            .iter()
            .zip(capacity)
            .enumerate()
            .map(|(i, (&d, &c))| MovementSeriesRow {
                time_bin: NaiveDate::from_ymd_opt(2025, 3, 7)
                    .unwrap()
                    .and_hms_opt(7, 0, 0)
                    .unwrap()
                    + Duration::minutes(15 * i as i64),
                direction: direction.to_string(),
                movement: movement.to_string(),
                smoothed_demand: d,
                cleaned_capacity: c,
            })
            .collect();
        (key, rows)
    }

    #[test]
    fn test_analyze_movement_without_disruption() {
        let (key, rows) = group("N", "Through", &[10.0, 10.0, 10.0], &[20.0, 20.0, 20.0]);
        let m = analyze_movement(&key, &rows, &ResilienceConfig::default());

        assert_eq!(m.samples, 3);
        assert_eq!(m.pr_preparation, Some(0.0));
        assert_eq!(m.or_operational, Some(0.0));
        assert_eq!(m.dr_design, Some(0.0));
        assert_eq!(m.rr_recovery, Some(0.0));
        assert_eq!(m.general_resilience, 0.0);
        assert_eq!(m.window_start, Some(rows[0].time_bin));
        assert_eq!(m.window_end, Some(rows[2].time_bin));
    }

    #[test]
    fn test_analyze_movement_counts_backlogged_shortfall() {
        let (key, rows) = group("S", "Left Turn", &[10.0, 10.0, 30.0, 30.0, 10.0], &[10.0; 5]);
        let m = analyze_movement(&key, &rows, &ResilienceConfig::default());

        // Utilized supply is 10, 10, 15, 15, 15 against demand 10, 10, 30, 30, 10.
        assert_eq!(m.general_resilience, 30.0);
        assert!(m.or_operational.is_some());
        assert_eq!(m.rr_recovery, Some(5.0));
    }

    #[tokio::test]
    async fn test_resilience_pipeline_one_row_per_group() {
        let groups: MovementGroups = [
            group("S", "Through", &[10.0, 40.0], &[10.0, 10.0]),
            group("N", "Left Turn", &[5.0, 5.0], &[10.0, 10.0]),
        ]
        .into_iter()
        .collect();

        let metrics = resilience_pipeline(groups, &ResilienceConfig::default(), 2, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].direction, "N");
        assert_eq!(metrics[1].direction, "S");
        assert_eq!(metrics[0].general_resilience, 0.0);
        assert_eq!(metrics[1].general_resilience, 25.0);
    }

    #[tokio::test]
    async fn test_backlog_pipeline_keeps_every_row() {
        let groups: MovementGroups = [
            group("E", "Through", &[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]),
            group("W", "Through", &[4.0], &[1.0]),
        ]
        .into_iter()
        .collect();

        let rows = backlog_pipeline(groups, &ResilienceConfig::default(), 1, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].direction, "W");
        assert_eq!(rows[3].unsatisfied_demand, 2.5);
    }
}
