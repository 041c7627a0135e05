//! Wall-clock time source

/// Wall-clock time lookup
///
/// Called from interrupt context, so implementations must be non-blocking.
pub trait Clock {
    /// Current Unix time in seconds, or `None` until the clock has been
    /// synchronized.
    fn unix_time(&self) -> Option<u64>;
}

impl<T: Clock> Clock for &T {
    fn unix_time(&self) -> Option<u64> {
        (**self).unix_time()
    }
}
