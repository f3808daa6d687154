//! Data types used by the backlog and resilience computations.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock format used for time bins in CSV input and output.
pub const TIME_BIN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a time bin as local wall time.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated ISO form, and either of
/// those with a trailing UTC offset, in which case the wall time in that
/// offset is kept.
pub fn parse_time_bin(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIME_BIN_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z")
                .or_else(|_| DateTime::parse_from_rfc3339(value))
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Serde adapter for [`NaiveDateTime`] time bins in CSV files.
pub mod time_bin_format {
    use super::{TIME_BIN_FORMAT, parse_time_bin};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIME_BIN_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_time_bin(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time bin '{raw}'")))
    }
}

/// Identity of a movement series: approach direction plus turning movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovementKey {
    pub direction: String,
    pub movement: String,
}

impl fmt::Display for MovementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.direction, self.movement)
    }
}

/// One time bin of joined demand and capacity for a movement.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementSeriesRow {
    pub time_bin: NaiveDateTime,
    pub direction: String,
    pub movement: String,
    pub smoothed_demand: f64,
    pub cleaned_capacity: f64,
}

impl MovementSeriesRow {
    pub fn key(&self) -> MovementKey {
        MovementKey {
            direction: self.direction.clone(),
            movement: self.movement.clone(),
        }
    }
}

/// A series row after the backlog fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogRow {
    #[serde(with = "time_bin_format")]
    pub time_bin: NaiveDateTime,
    pub direction: String,
    pub movement: String,
    pub smoothed_demand: f64,
    pub cleaned_capacity: f64,
    pub utilized_supply: f64,
    /// Demand left unserved at the end of this bin, carried into the next.
    pub unsatisfied_demand: f64,
}

/// Breakpoint-based resilience indices for one movement.
///
/// The four indices are `None` when the demand baseline is exactly zero.
/// When supply never falls short of demand, every value is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResilienceIndices {
    pub pr_preparation: Option<f64>,
    pub or_operational: Option<f64>,
    pub dr_design: Option<f64>,
    pub rr_recovery: Option<f64>,
    pub general_resilience: f64,
}

impl ResilienceIndices {
    pub fn zero() -> Self {
        Self {
            pr_preparation: Some(0.0),
            or_operational: Some(0.0),
            dr_design: Some(0.0),
            rr_recovery: Some(0.0),
            general_resilience: 0.0,
        }
    }
}

/// Ratio form of the gap against its baseline; a separate metric from
/// [`ResilienceIndices`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GapRatioIndices {
    pub operational_ratio: Option<f64>,
    pub peak_ratio: Option<f64>,
}

/// One reported row per movement and analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResilienceMetrics {
    pub direction: String,
    pub movement: String,
    #[serde(serialize_with = "serialize_optional_time_bin")]
    pub window_start: Option<NaiveDateTime>,
    #[serde(serialize_with = "serialize_optional_time_bin")]
    pub window_end: Option<NaiveDateTime>,
    pub samples: usize,
    #[serde(rename = "PR_preparation")]
    pub pr_preparation: Option<f64>,
    #[serde(rename = "OR_operational")]
    pub or_operational: Option<f64>,
    #[serde(rename = "DR_design")]
    pub dr_design: Option<f64>,
    #[serde(rename = "RR_recovery")]
    pub rr_recovery: Option<f64>,
    #[serde(rename = "General_Resilience")]
    pub general_resilience: f64,
    pub gap_operational_ratio: Option<f64>,
    pub gap_peak_ratio: Option<f64>,
}

fn serialize_optional_time_bin<S: serde::Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(t) => serializer.serialize_str(&t.format(TIME_BIN_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}
