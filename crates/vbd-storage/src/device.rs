use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::util::{checked_range, duration_as_us, sector_span};
use crate::{
    busy_wait_until, BackingStore, Classification, Clock, DeviceConfig, Direction, Geometry,
    IoBuffer, LatencyClassifier, LatencyStats, MonotonicClock, Request, Result, StatsSnapshot,
    TransferRequest, VbdError,
};

/// What a completed transfer measured and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub direction: Direction,
    pub sector: u64,
    pub sector_count: u64,
    /// Time spent in the memory copy alone.
    pub copy_latency_us: u64,
    /// Copy plus compensating wait; the value that was classified.
    pub total_latency_us: u64,
    pub classification: Classification,
    /// The copy alone exceeded the target, so no wait happened and the transfer was counted as an
    /// error.
    pub overdue: bool,
}

struct DeviceState {
    store: BackingStore,
    stats: LatencyStats,
}

/// In-memory block device that stretches every transfer to a target latency.
///
/// The backing store and the latency counters share one lock, held for the whole of a transfer
/// (copy, wait, classification and recording). Transfers on one device are therefore serialized
/// and a statistics snapshot never observes a half-applied request. Independent devices share
/// nothing.
pub struct LatencyDevice<C: Clock = MonotonicClock> {
    config: DeviceConfig,
    capacity_bytes: u64,
    classifier: LatencyClassifier,
    clock: C,
    state: Mutex<DeviceState>,
}

impl LatencyDevice<MonotonicClock> {
    /// Creates a device timed by the host monotonic clock.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> LatencyDevice<C> {
    /// Creates a device with an explicit time source.
    ///
    /// Fails without leaving anything allocated if the configuration is invalid or the backing
    /// store cannot be allocated. All counters start at zero.
    pub fn with_clock(config: DeviceConfig, clock: C) -> Result<Self> {
        let capacity_bytes = config.validate()?;
        let store = BackingStore::new(capacity_bytes)?;
        let classifier = LatencyClassifier::from_config(&config);

        let read = classifier.band(Direction::Read);
        let write = classifier.band(Direction::Write);
        tracing::info!(
            capacity_bytes,
            block_size = config.block_size_bytes,
            sectors = config.total_sectors,
            "latency device initialized (read band ({}, {}) us, write band ({}, {}) us)",
            read.lower_us,
            read.upper_us,
            write.lower_us,
            write.upper_us,
        );

        Ok(Self {
            config,
            capacity_bytes,
            classifier,
            clock,
            state: Mutex::new(DeviceState {
                store,
                stats: LatencyStats::new(),
            }),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn classifier(&self) -> &LatencyClassifier {
        &self.classifier
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::for_capacity_bytes(self.capacity_bytes)
    }

    /// Consistent copy of all four counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.lock().stats.snapshot()
    }

    /// Status report text (see [`StatsSnapshot`]) rendered from a single snapshot.
    pub fn status_report(&self) -> String {
        self.stats().to_string()
    }

    /// Dispatches one host request.
    pub fn handle(&self, request: Request<'_>) -> Result<TransferOutcome> {
        match request {
            Request::Transfer(req) => self.transfer(req),
            other => {
                let kind = other.kind();
                tracing::warn!(kind, "rejecting unsupported request");
                Err(VbdError::UnsupportedOperation(kind))
            }
        }
    }

    /// Executes one transfer and records its latency classification.
    ///
    /// Requests that do not fit the device (or whose buffer does not match the sector count) are
    /// rejected before any byte moves, any time is measured or any counter changes.
    pub fn transfer(&self, request: TransferRequest<'_>) -> Result<TransferOutcome> {
        let TransferRequest {
            sector,
            sector_count,
            buffer,
        } = request;
        let direction = buffer.direction();

        let (offset, len) = sector_span(
            sector,
            sector_count,
            u64::from(self.config.block_size_bytes),
        )
        .and_then(|(offset, len)| {
            checked_range(offset, len, self.capacity_bytes)?;
            Ok((offset, len))
        })
        .map_err(|err| {
            tracing::warn!(%direction, sector, sector_count, "rejecting transfer: {err}");
            err
        })?;
        if buffer.len() as u64 != len {
            return Err(VbdError::BufferLength {
                expected: len,
                actual: buffer.len(),
            });
        }

        let mut state = self.lock();

        let start = self.clock.now();
        match buffer {
            IoBuffer::Write(buf) => state.store.copy_in(offset, buf)?,
            IoBuffer::Read(buf) => state.store.copy_out(offset, buf)?,
        }
        let copy_end = self.clock.now();
        let copy_latency_us = duration_as_us(copy_end.saturating_sub(start));

        let target_us = self.classifier.target_us(direction);
        let (total_latency_us, classification, overdue) = if copy_latency_us > target_us {
            // Already slower than the target; waiting cannot bring it back into the band.
            (copy_latency_us, Classification::Error, true)
        } else {
            let deadline = start.saturating_add(Duration::from_micros(target_us));
            let final_time = busy_wait_until(&self.clock, deadline);
            let total_us = duration_as_us(final_time.saturating_sub(start));
            (
                total_us,
                self.classifier.classify(direction, total_us),
                false,
            )
        };

        state.stats.record(direction, classification);
        drop(state);

        tracing::debug!(
            %direction,
            sector,
            sector_count,
            copy_latency_us,
            total_latency_us,
            ?classification,
            overdue,
            "transfer complete"
        );

        Ok(TransferOutcome {
            direction,
            sector,
            sector_count,
            copy_latency_us,
            total_latency_us,
            classification,
            overdue,
        })
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        // Every mutation under the lock is a bounds-checked copy or a single counter bump, so a
        // panic elsewhere cannot leave the state torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> std::fmt::Debug for LatencyDevice<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyDevice")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}
