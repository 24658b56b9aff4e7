use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Classification, Direction};

/// Point-in-time copy of the four latency counters.
///
/// `Display` renders the status report consumed by reporting hosts:
///
/// ```text
/// r_confd_freq=<n>
/// r_error_freq=<n>
/// w_confd_freq=<n>
/// w_error_freq=<n>
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub read_confirmed: u64,
    pub read_error: u64,
    pub write_confirmed: u64,
    pub write_error: u64,
}

impl StatsSnapshot {
    pub fn total(&self) -> u64 {
        self.read_confirmed
            .saturating_add(self.read_error)
            .saturating_add(self.write_confirmed)
            .saturating_add(self.write_error)
    }

    pub fn count(&self, direction: Direction, classification: Classification) -> u64 {
        match (direction, classification) {
            (Direction::Read, Classification::Confirmed) => self.read_confirmed,
            (Direction::Read, Classification::Error) => self.read_error,
            (Direction::Write, Classification::Confirmed) => self.write_confirmed,
            (Direction::Write, Classification::Error) => self.write_error,
        }
    }
}

const KEYS: [&str; 4] = [
    "r_confd_freq",
    "r_error_freq",
    "w_confd_freq",
    "w_error_freq",
];

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = [
            self.read_confirmed,
            self.read_error,
            self.write_confirmed,
            self.write_error,
        ];
        for (key, value) in KEYS.iter().zip(values) {
            writeln!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseStatusError {
    #[error("line {line}: expected `key=value`")]
    MalformedLine { line: usize },

    #[error("line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: duplicate key `{key}`")]
    DuplicateKey { line: usize, key: String },

    #[error("line {line}: invalid counter value `{value}`")]
    InvalidValue { line: usize, value: String },

    #[error("missing key `{0}`")]
    MissingKey(&'static str),
}

impl FromStr for StatsSnapshot {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values: [Option<u64>; 4] = [None; 4];
        for (idx, raw) in s.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (key, value) = raw
                .split_once('=')
                .ok_or(ParseStatusError::MalformedLine { line })?;
            let slot = KEYS
                .iter()
                .position(|k| *k == key)
                .ok_or_else(|| ParseStatusError::UnknownKey {
                    line,
                    key: key.to_string(),
                })?;
            if values[slot].is_some() {
                return Err(ParseStatusError::DuplicateKey {
                    line,
                    key: key.to_string(),
                });
            }
            let value = value
                .parse::<u64>()
                .map_err(|_| ParseStatusError::InvalidValue {
                    line,
                    value: value.to_string(),
                })?;
            values[slot] = Some(value);
        }

        let get = |slot: usize| values[slot].ok_or(ParseStatusError::MissingKey(KEYS[slot]));
        Ok(Self {
            read_confirmed: get(0)?,
            read_error: get(1)?,
            write_confirmed: get(2)?,
            write_error: get(3)?,
        })
    }
}

/// Running latency counters of one device.
///
/// There is no internal locking: the owning [`crate::LatencyDevice`] mutates and snapshots the
/// counters under the same lock that guards its backing store.
#[derive(Debug, Default)]
pub struct LatencyStats {
    counters: StatsSnapshot,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments exactly one counter.
    pub fn record(&mut self, direction: Direction, classification: Classification) {
        let counter = match (direction, classification) {
            (Direction::Read, Classification::Confirmed) => &mut self.counters.read_confirmed,
            (Direction::Read, Classification::Error) => &mut self.counters.read_error,
            (Direction::Write, Classification::Confirmed) => &mut self.counters.write_confirmed,
            (Direction::Write, Classification::Error) => &mut self.counters.write_error,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.counters
    }
}
