//! Breakpoint-based resilience indices.
//!
//! With `gap = demand − utilized supply`, the series is cut at two
//! breakpoints:
//!
//! - onset `t1`: the sample just before supply first falls short of demand;
//! - plateau end `t2`: starting at `t1 + 1`, the last sample of the
//!   non-decreasing supply climb.
//!
//! | Index               | Definition                                                          |
//! |---------------------|---------------------------------------------------------------------|
//! | `PR_preparation`    | `demand[t1] − baseline`                                             |
//! | `OR_operational`    | `Σ[t1..=t2] (min(demand, supply[t2]) − supply)`                     |
//! | `DR_design`         | mean positive shortfall over `[0..=t2]` vs `supply[t2]` and `[t2+2..]` vs supply |
//! | `RR_recovery`       | mean surplus where supply exceeds demand                            |
//! | `General_Resilience`| total positive gap over the whole series                            |
//!
//! The baseline is the mean demand in the configured baseline hour, or the
//! mean gap over the series when that hour is absent.

use chrono::Timelike;
use std::borrow::Cow;

use crate::config::ResilienceConfig;
use crate::resilience::types::{BacklogRow, ResilienceIndices};
use crate::resilience::utility::{mean, positive_sum_count};

/// Indices of the disruption onset and the end of the following climb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoints {
    pub onset: usize,
    pub plateau_end: usize,
}

/// Locates the breakpoints, or `None` if supply never falls short of demand.
pub fn find_breakpoints(demand: &[f64], supply: &[f64]) -> Option<Breakpoints> {
    let n = demand.len().min(supply.len());
    let first_short = (0..n).find(|&i| supply[i] < demand[i])?;

    let onset = first_short.saturating_sub(1);
    let mut plateau_end = (onset + 1).min(n - 1);
    while plateau_end + 1 < n && supply[plateau_end + 1] >= supply[plateau_end] {
        plateau_end += 1;
    }

    Some(Breakpoints { onset, plateau_end })
}

/// Demand baseline: mean demand over baseline-hour rows, else mean gap.
pub fn baseline(rows: &[BacklogRow], gap: &[f64], baseline_hour: u32) -> f64 {
    let reference: Vec<f64> = rows
        .iter()
        .filter(|r| r.time_bin.hour() == baseline_hour)
        .map(|r| r.smoothed_demand)
        .collect();

    if reference.is_empty() {
        mean(gap)
    } else {
        mean(&reference)
    }
}

/// Computes the four breakpoint indices and the general resilience for one
/// movement's backlog rows.
pub fn resilience_indices(rows: &[BacklogRow], config: &ResilienceConfig) -> ResilienceIndices {
    let rows: Cow<'_, [BacklogRow]> = if rows.is_sorted_by_key(|r| r.time_bin) {
        Cow::Borrowed(rows)
    } else {
        let mut sorted = rows.to_vec();
        sorted.sort_by_key(|r| r.time_bin);
        Cow::Owned(sorted)
    };

    let demand: Vec<f64> = rows.iter().map(|r| r.smoothed_demand).collect();
    let supply: Vec<f64> = rows.iter().map(|r| r.utilized_supply).collect();
    let gap: Vec<f64> = demand.iter().zip(&supply).map(|(d, u)| d - u).collect();

    let Some(Breakpoints { onset: t1, plateau_end: t2 }) = find_breakpoints(&demand, &supply) else {
        return ResilienceIndices::zero();
    };

    let (general_resilience, _) = positive_sum_count(gap.iter().copied());

    let base = baseline(&rows, &gap, config.baseline_hour);
    if base == 0.0 {
        return ResilienceIndices {
            general_resilience,
            ..ResilienceIndices::default()
        };
    }

    let pr_preparation = demand[t1] - base;

    let designed_supply = supply[t2];
    let or_operational: f64 = (t1..=t2)
        .map(|k| demand[k].min(designed_supply) - supply[k])
        .sum();

    let (sum_a, count_a) =
        positive_sum_count(demand.iter().take(t2 + 1).map(|d| d - designed_supply));
    let (sum_b, count_b) = positive_sum_count(
        demand
            .iter()
            .zip(&supply)
            .skip(t2 + 2)
            .map(|(d, u)| d - u),
    );
    let dr_design = if count_a + count_b == 0 {
        0.0
    } else {
        (sum_a + sum_b) / (count_a + count_b) as f64
    };

    let surplus: Vec<f64> = demand
        .iter()
        .zip(&supply)
        .filter(|(d, u)| u > d)
        .map(|(d, u)| u - d)
        .collect();
    let rr_recovery = mean(&surplus);

    ResilienceIndices {
        pr_preparation: Some(pr_preparation),
        or_operational: Some(or_operational),
        dr_design: Some(dr_design),
        rr_recovery: Some(rr_recovery),
        general_resilience,
    }
}
