//! Cycle length and green occupancy from reconstructed cycles.

use tracing::debug;

use crate::config::SignalConfig;
use crate::signal::types::{GreenRatioRecord, GroupKey, Light, PhaseCycle, SignalEvent, ms_to_utc};

/// Produces one record per consecutive pair of red onsets in a group's
/// reconstructed output.
///
/// Green time counts every green event that starts at or after the opening
/// red and ends no later than the closing red plus `green_tail_ms`. The ratio
/// is `None` when that sum or the cycle length is zero, which keeps "no
/// green observed" apart from a measured zero.
pub fn green_ratios(
    key: &GroupKey,
    cycles: &[PhaseCycle],
    config: &SignalConfig,
) -> Vec<GreenRatioRecord> {
    let mut events: Vec<SignalEvent> = cycles.iter().flat_map(|c| c.events.iter().copied()).collect();
    events.sort_by_key(|e| e.start_ms);

    let red_starts: Vec<i64> = events
        .iter()
        .filter(|e| e.light == Light::Red)
        .map(|e| e.start_ms)
        .collect();

    let records: Vec<GreenRatioRecord> = red_starts
        .windows(2)
        .map(|pair| {
            let (start_ms, end_ms) = (pair[0], pair[1]);
            let window_end = end_ms.saturating_add(config.green_tail_ms);

            let green_ms: i64 = events
                .iter()
                .filter(|e| e.light == Light::Green && e.start_ms >= start_ms && e.end_ms <= window_end)
                .map(|e| e.end_ms.saturating_sub(e.start_ms))
                .fold(0, i64::saturating_add);

            let cycle_time_sec = end_ms.saturating_sub(start_ms) as f64 / 1000.0;
            let green_sec = green_ms as f64 / 1000.0;
            let green_ratio = if green_sec > 0.0 && cycle_time_sec > 0.0 {
                Some(green_sec / cycle_time_sec)
            } else {
                None
            };

            GreenRatioRecord {
                region_id: key.region_id,
                node_id: key.node_id,
                phase_id: key.phase_id,
                start_time: ms_to_utc(start_ms),
                end_time: ms_to_utc(end_ms),
                cycle_time_sec,
                green_ratio,
            }
        })
        .collect();

    debug!(group = %key, records = records.len(), "Green ratios computed");
    records
}
