use crate::{Result, VbdError};

/// Converts a sector range into a byte `(offset, len)` pair.
pub fn sector_span(sector: u64, sector_count: u64, block_size: u64) -> Result<(u64, u64)> {
    let offset = sector
        .checked_mul(block_size)
        .ok_or(VbdError::OffsetOverflow)?;
    let len = sector_count
        .checked_mul(block_size)
        .ok_or(VbdError::OffsetOverflow)?;
    Ok((offset, len))
}

pub fn checked_range(offset: u64, len: u64, capacity: u64) -> Result<()> {
    let end = offset.checked_add(len).ok_or(VbdError::OffsetOverflow)?;
    if end > capacity {
        return Err(VbdError::BeyondCapacity {
            offset,
            len,
            capacity,
        });
    }
    Ok(())
}

/// Whole microseconds in `d`, saturating at `u64::MAX`.
pub fn duration_as_us(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
