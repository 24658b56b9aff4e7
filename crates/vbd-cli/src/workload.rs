use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use vbd_storage::{
    Clock, Completion, LatencyDevice, Request, RequestServer, TransferRequest, VbdError,
};

/// Parameters of the synthetic request stream.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub ops: u64,
    pub read_percent: u8,
    pub max_request_sectors: u64,
    pub beyond_capacity_percent: u8,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadSummary {
    pub completed: u64,
    pub failed: u64,
    pub beyond_capacity: u64,
    pub overdue: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl WorkloadSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "completed": self.completed,
            "failed": self.failed,
            "beyond_capacity": self.beyond_capacity,
            "overdue": self.overdue,
            "bytes_read": self.bytes_read,
            "bytes_written": self.bytes_written,
        })
    }
}

/// Issues `cfg.ops` random transfers against `device`, one at a time.
///
/// Written data is derived from the sector number so reads can be spot-checked; a read that
/// returns bytes other than what the model expects is counted as a failure.
pub fn run<C: Clock>(device: &LatencyDevice<C>, cfg: &WorkloadConfig) -> WorkloadSummary {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut server = RequestServer::new(device);
    let mut summary = WorkloadSummary::default();

    let block_size = device.config().block_size_bytes as usize;
    let total_sectors = device.config().total_sectors;
    let max_sectors = cfg.max_request_sectors.min(total_sectors).max(1);
    let mut written = vec![false; usize::try_from(total_sectors).unwrap_or(usize::MAX)];

    for _ in 0..cfg.ops {
        let sectors = rng.gen_range(1..=max_sectors);
        let sector = if rng.gen_range(0..100u8) < cfg.beyond_capacity_percent {
            rng.gen_range(total_sectors - sectors + 1..=total_sectors)
        } else {
            rng.gen_range(0..=total_sectors - sectors)
        };
        let len = sectors as usize * block_size;
        let is_read = rng.gen_range(0..100u8) < cfg.read_percent;

        let completion = if is_read {
            let mut buf = vec![0u8; len];
            let completion = Completion::from(
                server.serve_one(Request::from(TransferRequest::read(sector, sectors, &mut buf))),
            );
            if completion.is_ok() && !verify(&buf, sector, block_size, &written) {
                tracing::error!(sector, sectors, "read returned unexpected data");
                summary.failed += 1;
                continue;
            }
            if completion.is_ok() {
                summary.bytes_read += len as u64;
            }
            completion
        } else {
            let buf = pattern(sector, sectors, block_size);
            let completion = Completion::from(
                server.serve_one(Request::from(TransferRequest::write(sector, sectors, &buf))),
            );
            if completion.is_ok() {
                summary.bytes_written += len as u64;
                for s in sector..sector + sectors {
                    written[s as usize] = true;
                }
            }
            completion
        };

        match completion {
            Completion::Ok(outcome) => {
                summary.completed += 1;
                if outcome.overdue {
                    summary.overdue += 1;
                }
            }
            Completion::IoError(err) => {
                summary.failed += 1;
                if matches!(err, VbdError::BeyondCapacity { .. }) {
                    summary.beyond_capacity += 1;
                }
            }
        }
    }

    summary
}

fn pattern(sector: u64, sectors: u64, block_size: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(sectors as usize * block_size);
    for s in sector..sector + sectors {
        buf.extend(sector_bytes(s, block_size));
    }
    buf
}

fn sector_bytes(sector: u64, block_size: usize) -> impl Iterator<Item = u8> {
    let seed = sector.to_le_bytes();
    (0..block_size).map(move |i| seed[i % 8] ^ (i as u8))
}

fn verify(buf: &[u8], first_sector: u64, block_size: usize, written: &[bool]) -> bool {
    buf.chunks(block_size).enumerate().all(|(i, chunk)| {
        let sector = first_sector + i as u64;
        if written[sector as usize] {
            chunk.iter().copied().eq(sector_bytes(sector, block_size))
        } else {
            chunk.iter().all(|b| *b == 0)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vbd_storage::{DeviceConfig, ManualClock};

    fn device(total_sectors: u64) -> LatencyDevice<ManualClock> {
        let config = DeviceConfig {
            total_sectors,
            target_read_latency_us: 100,
            target_write_latency_us: 200,
            tolerance_percent: 10,
            ..DeviceConfig::default()
        };
        let clock = ManualClock::new();
        clock.set_pause_step(Duration::from_micros(5));
        LatencyDevice::with_clock(config, clock).unwrap()
    }

    fn workload(ops: u64) -> WorkloadConfig {
        WorkloadConfig {
            ops,
            read_percent: 50,
            max_request_sectors: 4,
            beyond_capacity_percent: 0,
            seed: 7,
        }
    }

    #[test]
    fn in_range_workload_completes_every_request() {
        let dev = device(64);
        let summary = run(&dev, &workload(200));
        assert_eq!(summary.completed, 200);
        assert_eq!(summary.failed, 0);
        assert_eq!(dev.stats().total(), 200);
        // The manual clock with a 5 us wait step lands exactly on each target.
        assert_eq!(dev.stats().read_error + dev.stats().write_error, 0);
    }

    #[test]
    fn beyond_capacity_requests_fail_without_counting() {
        let dev = device(64);
        let cfg = WorkloadConfig {
            beyond_capacity_percent: 100,
            ..workload(50)
        };
        let summary = run(&dev, &cfg);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.beyond_capacity, 50);
        assert_eq!(dev.stats().total(), 0);
    }

    #[test]
    fn same_seed_same_outcome() {
        let a = run(&device(32), &workload(100));
        let b = run(&device(32), &workload(100));
        assert_eq!(a, b);
    }

    #[test]
    fn requests_larger_than_device_are_clamped() {
        let dev = device(2);
        let cfg = WorkloadConfig {
            max_request_sectors: 16,
            ..workload(20)
        };
        let summary = run(&dev, &cfg);
        assert_eq!(summary.completed, 20);
    }
}
