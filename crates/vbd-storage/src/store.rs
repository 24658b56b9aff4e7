use crate::util::checked_range;
use crate::{Result, VbdError};

/// Fixed-capacity in-memory disk contents.
///
/// The buffer is allocated once by [`BackingStore::new`] and never resized. Every access is
/// bounds-checked up front; an out-of-range access fails without touching any byte.
pub struct BackingStore {
    data: Vec<u8>,
}

impl BackingStore {
    /// Allocates a zero-filled store of `capacity` bytes.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn new(capacity: u64) -> Result<Self> {
        let len = usize::try_from(capacity)
            .map_err(|_| VbdError::AllocationFailure { bytes: capacity })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| VbdError::AllocationFailure { bytes: capacity })?;
        data.resize(len, 0);
        Ok(Self { data })
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Copies `bytes` into the store at `offset`.
    pub fn copy_in(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Fills `out` from the store starting at `offset`.
    pub fn copy_out(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let range = self.range(offset, out.len())?;
        out.copy_from_slice(&self.data[range]);
        Ok(())
    }

    /// Returns a copy of `len` bytes starting at `offset`.
    pub fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.copy_out(offset, &mut out)?;
        Ok(out)
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        checked_range(offset, len as u64, self.capacity_bytes())?;
        // Both bounds fit in usize because they are within `data.len()`.
        let start = offset as usize;
        Ok(start..start + len)
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("capacity_bytes", &self.data.len())
            .finish()
    }
}
