//! Latency-simulating virtual block device.
//!
//! The device keeps its contents in memory, but every transfer is stretched with an active
//! (busy) wait so the observed latency converges on a configured per-direction target. Each
//! observed latency is classified against a confidence band and counted, so hosts can check how
//! faithfully the target profile was reproduced. This crate provides:
//!
//! - [`LatencyDevice`]: transfer engine owning the backing store and statistics
//! - [`BackingStore`]: bounds-checked, fixed-capacity byte buffer
//! - [`LatencyClassifier`]: per-direction confidence bands
//! - [`Clock`]: injectable time source ([`MonotonicClock`] for real use, [`ManualClock`] for tests)
//! - [`RequestServer`]: in-order request dispatch with per-request completion
//!
//! Registering the device with a host OS and loading configuration live in the host layer
//! (see the `vbd` binary).

mod clock;
mod config;
mod device;
mod error;
mod geometry;
mod latency;
mod request;
mod stats;
mod store;
mod util;

pub use clock::{busy_wait_until, Clock, ManualClock, MonotonicClock};
pub use config::{
    DeviceConfig, DEFAULT_BLOCK_SIZE, DEFAULT_TOLERANCE_PERCENT, DEFAULT_TOTAL_SECTORS,
};
pub use device::{LatencyDevice, TransferOutcome};
pub use error::{Result, VbdError};
pub use geometry::{Geometry, KERNEL_SECTOR_SIZE};
pub use latency::{Classification, ConfidenceBand, Direction, LatencyClassifier};
pub use request::{Completion, IoBuffer, Request, RequestServer, TransferRequest};
pub use stats::{LatencyStats, ParseStatusError, StatsSnapshot};
pub use store::BackingStore;

#[cfg(test)]
mod proptests;
