/// Unit used when reporting capacity to partitioning tools, independent of the device block size.
pub const KERNEL_SECTOR_SIZE: u64 = 512;

/// Synthetic CHS geometry.
///
/// The numbers have no physical meaning; they exist so partitioning tools accept the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u64,
    pub heads: u8,
    pub sectors_per_track: u8,
    pub start: u64,
}

impl Geometry {
    pub const HEADS: u8 = 4;
    pub const SECTORS_PER_TRACK: u8 = 16;

    /// Geometry for a device of `capacity_sectors` 512-byte sectors.
    pub fn synthetic(capacity_sectors: u64) -> Self {
        Self {
            cylinders: (capacity_sectors & !0x3f) >> 6,
            heads: Self::HEADS,
            sectors_per_track: Self::SECTORS_PER_TRACK,
            start: 0,
        }
    }

    /// Geometry for a device of `capacity_bytes` bytes.
    pub fn for_capacity_bytes(capacity_bytes: u64) -> Self {
        Self::synthetic(capacity_bytes / KERNEL_SECTOR_SIZE)
    }
}
