//! Gap-ratio form of resilience.
//!
//! Compares the average and the worst gap against a baseline gap:
//! `operational = 1 − mean(gap) / baseline_gap` and
//! `peak = 1 − max(gap) / baseline_gap`. This is its own metric and is
//! reported next to, not instead of, the breakpoint indices.

use chrono::Timelike;

use crate::config::ResilienceConfig;
use crate::resilience::types::{BacklogRow, GapRatioIndices};
use crate::resilience::utility::mean;

/// Computes the gap ratios, or nulls when the baseline gap is zero or the
/// series is empty.
pub fn gap_ratio(rows: &[BacklogRow], config: &ResilienceConfig) -> GapRatioIndices {
    if rows.is_empty() {
        return GapRatioIndices::default();
    }

    let gap: Vec<f64> = rows.iter().map(|r| r.smoothed_demand - r.utilized_supply).collect();
    let reference: Vec<f64> = rows
        .iter()
        .zip(&gap)
        .filter(|(r, _)| r.time_bin.hour() == config.baseline_hour)
        .map(|(_, g)| *g)
        .collect();

    let baseline_gap = if reference.is_empty() {
        mean(&gap)
    } else {
        mean(&reference)
    };

    if baseline_gap == 0.0 {
        return GapRatioIndices::default();
    }

    let max_gap = gap.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    GapRatioIndices {
        operational_ratio: Some(1.0 - mean(&gap) / baseline_gap),
        peak_ratio: Some(1.0 - max_gap / baseline_gap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn rows(start_hour: u32, gaps: &[f64]) -> Vec<BacklogRow> {
        gaps.iter()
            .enumerate()
            .map(|(i, &g)| BacklogRow {
                time_bin: NaiveDate::from_ymd_opt(2025, 3, 7)
                    .unwrap()
                    .and_hms_opt(start_hour, 0, 0)
                    .unwrap()
                    + Duration::minutes(15 * i as i64),
                direction: "N".to_string(),
                movement: "Through".to_string(),
                smoothed_demand: 100.0,
                cleaned_capacity: 100.0,
                utilized_supply: 100.0 - g,
                unsatisfied_demand: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_whole_series_baseline() {
        let r = gap_ratio(&rows(8, &[2.0, 4.0, 6.0]), &ResilienceConfig::default());
        // mean gap 4 is its own baseline, so the operational ratio is 0.
        assert_eq!(r.operational_ratio, Some(0.0));
        assert_eq!(r.peak_ratio, Some(1.0 - 6.0 / 4.0));
    }

    #[test]
    fn test_baseline_hour_gap() {
        // 05:00..05:45 carry gap 2, 06:00 carries gap 10.
        let r = gap_ratio(&rows(5, &[2.0, 2.0, 2.0, 2.0, 10.0]), &ResilienceConfig::default());
        assert_eq!(r.operational_ratio, Some(1.0 - 3.6 / 2.0));
        assert_eq!(r.peak_ratio, Some(1.0 - 10.0 / 2.0));
    }

    #[test]
    fn test_zero_baseline_is_null() {
        let r = gap_ratio(&rows(8, &[5.0, -5.0]), &ResilienceConfig::default());
        assert_eq!(r, GapRatioIndices::default());
    }

    #[test]
    fn test_empty_is_null() {
        assert_eq!(gap_ratio(&[], &ResilienceConfig::default()), GapRatioIndices::default());
    }
}
