use serde::{Deserialize, Serialize};

use crate::{Result, VbdError};

pub const DEFAULT_BLOCK_SIZE: u32 = 512;
pub const DEFAULT_TOTAL_SECTORS: u64 = 1024;

/// Default width of the confidence band, as a percentage of the target latency.
///
/// Earlier revisions of the device used 10 %; the current default is 5 %.
pub const DEFAULT_TOLERANCE_PERCENT: u32 = 5;

/// Device parameters, fixed for the lifetime of a [`crate::LatencyDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Size of one sector in bytes.
    pub block_size_bytes: u32,
    pub total_sectors: u64,
    /// Target read latency in microseconds. Zero disables the simulated delay.
    pub target_read_latency_us: u64,
    /// Target write latency in microseconds. Zero disables the simulated delay.
    pub target_write_latency_us: u64,
    /// Half-width of the confidence band as a percentage of the target latency.
    ///
    /// This is a band width only; it never caps or rejects anything.
    pub tolerance_percent: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            block_size_bytes: DEFAULT_BLOCK_SIZE,
            total_sectors: DEFAULT_TOTAL_SECTORS,
            target_read_latency_us: 0,
            target_write_latency_us: 0,
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
        }
    }
}

impl DeviceConfig {
    /// Checks the parameters and returns the device capacity in bytes.
    pub fn validate(&self) -> Result<u64> {
        if self.block_size_bytes == 0 {
            return Err(VbdError::InvalidConfig("block_size_bytes must be > 0"));
        }
        if self.total_sectors == 0 {
            return Err(VbdError::InvalidConfig("total_sectors must be > 0"));
        }
        let capacity = self
            .total_sectors
            .checked_mul(u64::from(self.block_size_bytes))
            .ok_or(VbdError::InvalidConfig("capacity overflows u64"))?;
        if usize::try_from(capacity).is_err() {
            return Err(VbdError::InvalidConfig(
                "capacity exceeds addressable memory",
            ));
        }
        Ok(capacity)
    }

    /// `total_sectors * block_size_bytes`, saturating on overflow.
    pub fn capacity_bytes(&self) -> u64 {
        self.total_sectors
            .saturating_mul(u64::from(self.block_size_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_half_mib_device_without_delay() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.capacity_bytes(), 512 * 1024);
        assert_eq!(cfg.target_read_latency_us, 0);
        assert_eq!(cfg.target_write_latency_us, 0);
        assert_eq!(cfg.tolerance_percent, DEFAULT_TOLERANCE_PERCENT);
        assert_eq!(cfg.validate().unwrap(), 512 * 1024);
    }

    #[test]
    fn zero_sectors_is_rejected() {
        let cfg = DeviceConfig {
            total_sectors: 0,
            ..DeviceConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            VbdError::InvalidConfig(_)
        ));
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let cfg = DeviceConfig {
            block_size_bytes: 0,
            ..DeviceConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            VbdError::InvalidConfig(_)
        ));
    }

    #[test]
    fn overflowing_capacity_is_rejected() {
        let cfg = DeviceConfig {
            total_sectors: u64::MAX,
            ..DeviceConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            VbdError::InvalidConfig(_)
        ));
        assert_eq!(cfg.capacity_bytes(), u64::MAX);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: DeviceConfig =
            serde_json::from_str(r#"{ "target_read_latency_us": 1000 }"#).unwrap();
        assert_eq!(cfg.target_read_latency_us, 1000);
        assert_eq!(cfg.block_size_bytes, DEFAULT_BLOCK_SIZE);
        assert_eq!(cfg.total_sectors, DEFAULT_TOTAL_SECTORS);
    }
}
