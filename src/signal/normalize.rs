//! Event cleanup ahead of cycle reconstruction.
//!
//! Raw SPaT logs repeat the same phase state across overlapping messages
//! and occasionally carry zero-length or runaway intervals. Cleanup keeps the
//! first copy of each `(region, node, phase, light, start)` and drops events
//! whose duration falls outside the configured bounds.

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::SignalConfig;
use crate::signal::types::{GroupKey, Light, RawSignalEvent, SignalEvent};

/// Counts reported by a normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub duplicates: usize,
    pub out_of_range: usize,
    pub kept: usize,
}

/// Cleaned events, grouped by phase and sorted by start time within a group.
pub type EventGroups = BTreeMap<GroupKey, Vec<SignalEvent>>;

/// Classifies raw light codes, then deduplicates, filters and groups.
pub fn normalize(raw: &[RawSignalEvent], config: &SignalConfig) -> EventGroups {
    let events = raw.iter().map(|r| SignalEvent {
        key: GroupKey {
            region_id: r.region_id,
            node_id: r.node_id,
            phase_id: r.phase_id,
        },
        light: config.light_codes.classify(r.light_code),
        start_ms: r.start_ms,
        end_ms: r.end_ms,
    });

    let (groups, stats) = normalize_events(events, config);
    info!(
        input = stats.input,
        duplicates = stats.duplicates,
        out_of_range = stats.out_of_range,
        kept = stats.kept,
        groups = groups.len(),
        "Signal events normalized"
    );
    groups
}

/// Deduplicates and duration-filters already classified events.
///
/// Deduplication runs before the duration filter, so a duplicate is dropped
/// even when its first copy is later rejected for its duration.
pub fn normalize_events(
    events: impl IntoIterator<Item = SignalEvent>,
    config: &SignalConfig,
) -> (EventGroups, NormalizeStats) {
    let mut stats = NormalizeStats::default();
    let mut seen: HashSet<(GroupKey, Light, i64)> = HashSet::new();
    let mut groups: EventGroups = BTreeMap::new();

    for event in events {
        stats.input += 1;

        if !seen.insert((event.key, event.light, event.start_ms)) {
            stats.duplicates += 1;
            continue;
        }

        let in_range = event
            .duration_s()
            .is_some_and(|d| d >= config.min_duration_s && d <= config.max_duration_s);
        if !in_range {
            stats.out_of_range += 1;
            continue;
        }

        stats.kept += 1;
        groups.entry(event.key).or_default().push(event);
    }

    for events in groups.values_mut() {
        events.sort_by_key(|e| e.start_ms);
    }

    (groups, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(phase_id: u32, light_code: i64, start_ms: i64, end_ms: i64) -> RawSignalEvent {
        RawSignalEvent {
            region_id: 323,
            node_id: 7,
            phase_id,
            light_code,
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let config = SignalConfig::default();
        let input = vec![
            raw(1, 3, 0, 30_000),
            raw(1, 3, 0, 31_000),
            raw(1, 5, 30_000, 60_000),
        ];

        let groups = normalize(&input, &config);
        let events = groups.values().next().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].end_ms, 30_000);
    }

    #[test]
    fn test_same_start_different_light_is_not_duplicate() {
        let config = SignalConfig::default();
        let input = vec![raw(1, 3, 0, 10_000), raw(1, 5, 0, 10_000)];

        let groups = normalize(&input, &config);
        assert_eq!(groups.values().next().unwrap().len(), 2);
    }

    #[test]
    fn test_duration_bounds_are_inclusive() {
        let config = SignalConfig::default();
        let input = vec![
            raw(1, 3, 0, 2_999),
            raw(1, 3, 10_000, 13_000),
            raw(1, 5, 20_000, 1_020_000),
            raw(1, 5, 2_000_000, 3_000_001),
        ];

        let (groups, stats) = normalize_events(
            input.iter().map(|r| SignalEvent {
                key: GroupKey {
                    region_id: r.region_id,
                    node_id: r.node_id,
                    phase_id: r.phase_id,
                },
                light: config.light_codes.classify(r.light_code),
                start_ms: r.start_ms,
                end_ms: r.end_ms,
            }),
            &config,
        );

        assert_eq!(stats.out_of_range, 2);
        assert_eq!(stats.kept, 2);
        let starts: Vec<i64> = groups.values().next().unwrap().iter().map(|e| e.start_ms).collect();
        assert_eq!(starts, vec![10_000, 20_000]);
    }

    #[test]
    fn test_dedup_runs_before_duration_filter() {
        let config = SignalConfig::default();
        // First copy is too short; the second copy is a duplicate and is dropped too.
        let input = vec![raw(1, 3, 0, 1_000), raw(1, 3, 0, 20_000)];

        let groups = normalize(&input, &config);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_unknown_and_error_codes_are_retained() {
        let config = SignalConfig::default();
        let input = vec![raw(1, 2, 0, 5_000), raw(1, 42, 5_000, 10_000)];

        let groups = normalize(&input, &config);
        let lights: Vec<Light> = groups.values().next().unwrap().iter().map(|e| e.light).collect();
        assert_eq!(lights, vec![Light::Error, Light::Unknown(42)]);
    }

    #[test]
    fn test_groups_are_split_and_sorted() {
        let config = SignalConfig::default();
        let input = vec![
            raw(2, 3, 50_000, 60_000),
            raw(1, 5, 40_000, 45_000),
            raw(1, 3, 10_000, 40_000),
        ];

        let groups = normalize(&input, &config);
        assert_eq!(groups.len(), 2);

        let phase1 = &groups[&GroupKey { region_id: 323, node_id: 7, phase_id: 1 }];
        assert_eq!(phase1[0].start_ms, 10_000);
        assert_eq!(phase1[1].start_ms, 40_000);
    }

    #[test]
    fn test_extreme_timestamps_are_filtered() {
        let config = SignalConfig::default();
        let input = vec![
            raw(1, 3, i64::MIN, i64::MAX),
            raw(1, 5, i64::MAX, i64::MIN),
            raw(1, 3, 0, 30_000),
        ];

        let (groups, stats) = normalize_events(
            input.iter().map(|r| SignalEvent {
                key: GroupKey {
                    region_id: r.region_id,
                    node_id: r.node_id,
                    phase_id: r.phase_id,
                },
                light: config.light_codes.classify(r.light_code),
                start_ms: r.start_ms,
                end_ms: r.end_ms,
            }),
            &config,
        );

        assert_eq!(stats.out_of_range, 2);
        assert_eq!(stats.kept, 1);
        assert_eq!(groups.values().next().unwrap()[0].start_ms, 0);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let config = SignalConfig::default();
        let input = vec![
            raw(1, 3, 0, 30_000),
            raw(1, 3, 0, 30_000),
            raw(1, 5, 30_000, 60_000),
            raw(1, 7, 60_000, 61_000),
            raw(2, 3, 5_000, 9_000),
            raw(2, 9, 9_000, 19_000),
        ];

        let first = normalize(&input, &config);
        let (second, stats) =
            normalize_events(first.values().flatten().copied(), &config);

        assert_eq!(first, second);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.out_of_range, 0);
    }
}
