//! Carry-forward queue simulation for one movement series.
//!
//! Each bin is offered its own demand plus whatever the previous bin left
//! unserved. Service is capped at `cleaned_capacity × capacity_multiplier`;
//! the excess becomes the next bin's backlog. The fold is order-dependent,
//! so rows are sorted by time bin first.

use crate::config::ResilienceConfig;
use crate::resilience::types::{BacklogRow, MovementSeriesRow};

/// Runs the backlog fold over one `(direction, movement)` series.
pub fn simulate_backlog(rows: &[MovementSeriesRow], config: &ResilienceConfig) -> Vec<BacklogRow> {
    let mut ordered: Vec<&MovementSeriesRow> = rows.iter().collect();
    ordered.sort_by_key(|r| r.time_bin);

    let mut backlog = 0.0_f64;

    ordered
        .into_iter()
        .map(|row| {
            let total_demand = row.smoothed_demand + backlog;
            let effective_capacity = row.cleaned_capacity * config.capacity_multiplier;

            let utilized_supply = effective_capacity.min(total_demand);
            backlog = (total_demand - effective_capacity).max(0.0);

            BacklogRow {
                time_bin: row.time_bin,
                direction: row.direction.clone(),
                movement: row.movement.clone(),
                smoothed_demand: row.smoothed_demand,
                cleaned_capacity: row.cleaned_capacity,
                utilized_supply,
                unsatisfied_demand: backlog,
            }
        })
        .collect()
}
