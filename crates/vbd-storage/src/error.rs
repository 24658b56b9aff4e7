use thiserror::Error;

pub type Result<T> = std::result::Result<T, VbdError>;

/// Unified error type for device initialization and per-request failures.
///
/// Only [`VbdError::AllocationFailure`] and [`VbdError::InvalidConfig`] are produced at
/// initialization. Every other variant is a per-request failure: the request is rejected before
/// any data moves, no latency is measured and no statistics counter changes, and the device stays
/// usable.
#[derive(Debug, Error)]
pub enum VbdError {
    #[error("beyond capacity: offset={offset} len={len} capacity={capacity}")]
    BeyondCapacity { offset: u64, len: u64, capacity: u64 },

    #[error("integer overflow while computing byte offsets")]
    OffsetOverflow,

    #[error("buffer length {actual} does not match transfer length {expected}")]
    BufferLength { expected: u64, actual: usize },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("failed to allocate {bytes} byte backing store")]
    AllocationFailure { bytes: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl VbdError {
    /// Whether the error rejected a single request (as opposed to failing device startup).
    pub fn is_per_request(&self) -> bool {
        !matches!(
            self,
            VbdError::AllocationFailure { .. } | VbdError::InvalidConfig(_)
        )
    }
}
