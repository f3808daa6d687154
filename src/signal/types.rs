//! Data types shared by the signal-timing pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Light state of a signal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Light {
    Red,
    Green,
    Yellow,
    Error,
    /// A code outside the configured table, kept verbatim.
    Unknown(i64),
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Light::Red => write!(f, "red"),
            Light::Green => write!(f, "green"),
            Light::Yellow => write!(f, "yellow"),
            Light::Error => write!(f, "error"),
            Light::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// One phase state as decoded from a SPaT log, before any cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignalEvent {
    pub region_id: u32,
    pub node_id: u32,
    pub phase_id: u32,
    pub light_code: i64,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Identity of a signal phase: events are grouped and cycles reconstructed
/// per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub region_id: u32,
    pub node_id: u32,
    pub phase_id: u32,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region_id, self.node_id, self.phase_id)
    }
}

/// A validated light-state interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    pub key: GroupKey,
    pub light: Light,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl SignalEvent {
    /// Length in seconds, or `None` when the timestamps are too far apart
    /// to subtract.
    pub fn duration_s(&self) -> Option<f64> {
        self.end_ms
            .checked_sub(self.start_ms)
            .map(|ms| ms as f64 / 1000.0)
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        ms_to_utc(self.start_ms)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        ms_to_utc(self.end_ms)
    }
}

/// One pass through a group's light pattern, always opening on red.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCycle {
    pub events: Vec<SignalEvent>,
}

impl PhaseCycle {
    pub fn start_ms(&self) -> Option<i64> {
        self.events.first().map(|e| e.start_ms)
    }
}

/// Cycle length and green occupancy between two consecutive red onsets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreenRatioRecord {
    pub region_id: u32,
    pub node_id: u32,
    pub phase_id: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cycle_time_sec: f64,
    /// `None` when the window held no green time or had zero length.
    pub green_ratio: Option<f64>,
}

/// Converts epoch milliseconds to a UTC timestamp, clamping values chrono
/// cannot represent to the epoch.
pub fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
