//! Network capability sets
//!
//! Two shapes of uplink are used: a connection-oriented byte stream for raw
//! sample records, and a named pub/sub channel for digest messages.

use core::future::Future;

use embedded_io_async::ErrorType;

/// Connection-oriented byte transport to a fixed endpoint
///
/// `write` may transmit fewer bytes than requested; callers treat a short
/// write as a failed record.
pub trait Transport: ErrorType {
    /// Whether a connection is currently established
    fn is_connected(&self) -> bool;

    /// Open the connection. Implementations must bound the attempt with a
    /// timeout.
    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Write a buffer, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Close the connection. Never fails; errors are logged by the implementor.
    fn close(&mut self) -> impl Future<Output = ()>;
}

/// Pub/sub message publisher
pub trait Publisher {
    type Error: core::fmt::Debug;

    /// Whether the publisher can currently reach its broker
    fn is_connected(&self) -> bool;

    /// Publish one message on a named channel
    fn publish(
        &mut self,
        channel: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
