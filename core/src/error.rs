//! Tracker error types

/// Errors raised by the ring, the digest and the orchestrator
///
/// Only [`Error::RecordOverrun`] is fatal. Everything else is recovered
/// locally: transport failures by retrying on the next pass, a full ring by
/// dropping the newest sample, a bad tunable by keeping the old period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Not connected, and a connect attempt failed or timed out
    TransportUnavailable,
    /// A write transmitted fewer bytes than the record
    PartialWrite,
    /// A formatted record did not fit its fixed-size line buffer
    RecordOverrun,
    /// The sample ring had no free slot
    BufferFull,
    /// A runtime tunable payload was not a positive integer period
    InvalidTunable,
    /// Ring storage shorter than two slots
    InvalidCapacity,
    /// Digest storage empty or too large to index with a `u16`
    InvalidSlotCount,
    /// Digest chunking parameters cannot produce a valid message
    InvalidChunking,
    /// The accelerometer rejected a bus transaction
    Sensor,
    /// The durable store failed or is too small for the digest image
    Storage,
}

impl Error {
    /// Whether the device must restart rather than continue
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::RecordOverrun)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "Transport unavailable"),
            Self::PartialWrite => write!(f, "Partial write"),
            Self::RecordOverrun => write!(f, "Record overran its line buffer"),
            Self::BufferFull => write!(f, "Sample ring full"),
            Self::InvalidTunable => write!(f, "Invalid tunable value"),
            Self::InvalidCapacity => write!(f, "Ring capacity must be at least 2"),
            Self::InvalidSlotCount => write!(f, "Invalid digest slot count"),
            Self::InvalidChunking => write!(f, "Invalid digest chunk parameters"),
            Self::Sensor => write!(f, "Sensor error"),
            Self::Storage => write!(f, "Durable storage error"),
        }
    }
}

impl core::error::Error for Error {}
