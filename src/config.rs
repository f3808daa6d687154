//! Tunable parameters for the signal and resilience pipelines.
//!
//! Every threshold the algorithms use is carried here and passed in
//! explicitly, so tests can vary tolerances without touching globals.
//! A config file is a JSON object; omitted fields keep their defaults:
//! ```json
//! {
//!   "signal": { "contiguity_ms": 1500, "lookahead": 2000 },
//!   "resilience": { "baseline_hour": 4 }
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::signal::types::Light;

/// Numeric light codes as they appear in decoded SPaT records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCodes {
    pub red: i64,
    pub green: i64,
    pub yellow: i64,
    pub error: Vec<i64>,
}

impl Default for LightCodes {
    fn default() -> Self {
        Self {
            red: 3,
            green: 5,
            yellow: 7,
            error: vec![1, 2, 4, 6, 8],
        }
    }
}

impl LightCodes {
    /// Maps a raw code to a [`Light`]. Codes outside the table are kept as
    /// [`Light::Unknown`] so they still take part in deduplication.
    pub fn classify(&self, code: i64) -> Light {
        if code == self.red {
            Light::Red
        } else if code == self.green {
            Light::Green
        } else if code == self.yellow {
            Light::Yellow
        } else if self.error.contains(&code) {
            Light::Error
        } else {
            Light::Unknown(code)
        }
    }
}

/// Parameters for event normalization, cycle reconstruction and green ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub light_codes: LightCodes,
    /// Shortest event kept, in seconds (inclusive).
    pub min_duration_s: f64,
    /// Longest event kept, in seconds (inclusive).
    pub max_duration_s: f64,
    /// Maximum distance between one state's end and the next state's start.
    pub contiguity_ms: i64,
    /// How many subsequent events are searched for the next expected state.
    pub lookahead: usize,
    /// Slack added after the closing red onset when collecting green time.
    pub green_tail_ms: i64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            light_codes: LightCodes::default(),
            min_duration_s: 3.0,
            max_duration_s: 1000.0,
            contiguity_ms: 1000,
            lookahead: 5000,
            green_tail_ms: 4000,
        }
    }
}

/// Parameters for the backlog fold and the resilience indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Factor applied to cleaned capacity to get the effective service ceiling.
    pub capacity_multiplier: f64,
    /// Local hour-of-day whose rows define the demand baseline.
    pub baseline_hour: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            capacity_multiplier: 1.5,
            baseline_hour: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub signal: SignalConfig,
    pub resilience: ResilienceConfig,
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path` and validates it.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.signal;
        if !(s.min_duration_s >= 0.0 && s.min_duration_s <= s.max_duration_s) {
            bail!(
                "min_duration_s ({}) must be non-negative and not above max_duration_s ({})",
                s.min_duration_s,
                s.max_duration_s
            );
        }
        if s.contiguity_ms <= 0 {
            bail!("contiguity_ms must be positive, got {}", s.contiguity_ms);
        }
        if s.lookahead == 0 {
            bail!("lookahead must be at least 1");
        }
        if s.green_tail_ms < 0 {
            bail!("green_tail_ms must not be negative, got {}", s.green_tail_ms);
        }

        let codes = &s.light_codes;
        if codes.red == codes.green || codes.red == codes.yellow || codes.green == codes.yellow {
            bail!("red, green and yellow light codes must be distinct");
        }

        let r = &self.resilience;
        if !(r.capacity_multiplier.is_finite() && r.capacity_multiplier > 0.0) {
            bail!(
                "capacity_multiplier must be a positive number, got {}",
                r.capacity_multiplier
            );
        }
        if r.baseline_hour > 23 {
            bail!("baseline_hour must be within 0..=23, got {}", r.baseline_hour);
        }

        Ok(())
    }
}
