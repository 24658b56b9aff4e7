use serde::{Deserialize, Serialize};

use crate::DeviceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an observed latency landed inside its confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Confirmed,
    /// Outside the band, either too fast or too slow.
    Error,
}

/// Open interval `(lower_us, upper_us)` around a target latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceBand {
    pub target_us: u64,
    pub lower_us: u64,
    pub upper_us: u64,
}

impl ConfidenceBand {
    /// Band of `target_us ± target_us * tolerance_percent / 100`, in integer microseconds.
    ///
    /// The lower bound saturates at zero for tolerances above 100 %.
    pub fn new(target_us: u64, tolerance_percent: u32) -> Self {
        let half_width = u128::from(target_us) * u128::from(tolerance_percent) / 100;
        let half_width = u64::try_from(half_width).unwrap_or(u64::MAX);
        Self {
            target_us,
            lower_us: target_us.saturating_sub(half_width),
            upper_us: target_us.saturating_add(half_width),
        }
    }

    /// Both bounds are exclusive: a latency exactly on a bound is not contained.
    pub fn contains(&self, observed_us: u64) -> bool {
        self.lower_us < observed_us && observed_us < self.upper_us
    }
}

/// Per-direction confidence bands, computed once at device initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyClassifier {
    read: ConfidenceBand,
    write: ConfidenceBand,
}

impl LatencyClassifier {
    pub fn new(
        target_read_latency_us: u64,
        target_write_latency_us: u64,
        tolerance_percent: u32,
    ) -> Self {
        Self {
            read: ConfidenceBand::new(target_read_latency_us, tolerance_percent),
            write: ConfidenceBand::new(target_write_latency_us, tolerance_percent),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.target_read_latency_us,
            config.target_write_latency_us,
            config.tolerance_percent,
        )
    }

    pub fn band(&self, direction: Direction) -> ConfidenceBand {
        match direction {
            Direction::Read => self.read,
            Direction::Write => self.write,
        }
    }

    pub fn target_us(&self, direction: Direction) -> u64 {
        self.band(direction).target_us
    }

    pub fn classify(&self, direction: Direction, observed_us: u64) -> Classification {
        if self.band(direction).contains(observed_us) {
            Classification::Confirmed
        } else {
            Classification::Error
        }
    }
}
