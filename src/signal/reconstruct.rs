//! Reassembles red → green [→ yellow] cycles from a phase's cleaned events.
//!
//! The scan walks the start-sorted events with an explicit cursor. From each
//! red onset it repeatedly looks ahead (at most `lookahead` events past the
//! cursor) for the next expected light whose start lies within
//! `contiguity_ms` of the previous state's end. The pattern wraps, so one
//! chain may run through several consecutive cycles. A red with no matching
//! successor is discarded.

use std::borrow::Cow;
use tracing::debug;

use crate::config::SignalConfig;
use crate::signal::types::{GroupKey, Light, PhaseCycle, SignalEvent};

const WITH_YELLOW: [Light; 3] = [Light::Red, Light::Green, Light::Yellow];
const WITHOUT_YELLOW: [Light; 2] = [Light::Red, Light::Green];

/// The light pattern for a whole group: yellow takes part only if the group
/// shows yellow at least once.
pub fn cycle_pattern(events: &[SignalEvent]) -> &'static [Light] {
    if events.iter().any(|e| e.light == Light::Yellow) {
        &WITH_YELLOW
    } else {
        &WITHOUT_YELLOW
    }
}

/// Reconstructs the cycles of one group.
///
/// `events` should already be sorted by start time; unsorted input is sorted
/// on a copy first.
pub fn reconstruct(events: &[SignalEvent], config: &SignalConfig) -> Vec<PhaseCycle> {
    let events: Cow<'_, [SignalEvent]> = if events.is_sorted_by_key(|e| e.start_ms) {
        Cow::Borrowed(events)
    } else {
        let mut sorted = events.to_vec();
        sorted.sort_by_key(|e| e.start_ms);
        Cow::Owned(sorted)
    };

    let pattern = cycle_pattern(&events);
    let n = events.len();
    let mut cycles = Vec::new();
    let mut pos = 0;

    while let Some(red_idx) = (pos..n).find(|&i| events[i].light == Light::Red) {
        let mut cursor = red_idx;
        let mut chain = vec![events[red_idx]];
        let mut last_end = events[red_idx].end_ms;
        let mut expected = 1 % pattern.len();

        loop {
            let window_end = cursor
                .saturating_add(1)
                .saturating_add(config.lookahead)
                .min(n);
            let target = pattern[expected];
            let found = (cursor + 1..window_end).find(|&i| {
                let e = &events[i];
                e.light == target && e.start_ms.abs_diff(last_end) < config.contiguity_ms.unsigned_abs()
            });

            let Some(i) = found else { break };

            chain.push(events[i]);
            cursor = i;
            last_end = events[i].end_ms;
            expected = (expected + 1) % pattern.len();
        }

        if chain.len() > 1 {
            cycles.push(PhaseCycle { events: chain });
        }

        pos = cursor + 1;
    }

    cycles
}

/// Runs [`reconstruct`] for one group and logs how much of it matched.
pub fn reconstruct_group(
    key: &GroupKey,
    events: &[SignalEvent],
    config: &SignalConfig,
) -> Vec<PhaseCycle> {
    let cycles = reconstruct(events, config);
    let matched: usize = cycles.iter().map(|c| c.events.len()).sum();
    debug!(
        group = %key,
        events = events.len(),
        cycles = cycles.len(),
        matched,
        "Phase cycles reconstructed"
    );
    cycles
}
