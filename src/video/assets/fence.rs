impl_handle!(FenceHandle);

/// Result of waiting on a fence.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum FenceStatus {
    /// The GPU passed the fence.
    ConditionSatisfied,
    /// The timeout expired before the GPU passed the fence.
    TimeoutExpired,
    Error,
}

/// Waits forever.
pub const FENCE_WAIT_FOR_EVER: u64 = ::std::u64::MAX;
