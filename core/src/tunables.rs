//! Runtime-adjustable timer periods
//!
//! Payloads arrive as text from a remote command surface and are parsed
//! here; applying them is up to the orchestrator.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tunable {
    /// No-activity period before deep sleep
    SleepTimeout,
    /// Streaming window opened by each interrupt
    StreamingWindow,
    /// High-rate sample period while streaming
    SampleInterval,
}

impl Tunable {
    pub const ALL: [Tunable; 3] = [
        Tunable::SleepTimeout,
        Tunable::StreamingWindow,
        Tunable::SampleInterval,
    ];

    pub fn from_command(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tunable| tunable.command() == name)
    }

    pub const fn command(self) -> &'static str {
        match self {
            Tunable::SleepTimeout => "sleep-time",
            Tunable::StreamingWindow => "streaming-window",
            Tunable::SampleInterval => "sample-interval",
        }
    }
}

/// Parse a period in milliseconds
///
/// Surrounding whitespace is ignored. Anything but decimal digits, or a
/// value that does not fit `u32`, is [`Error::InvalidTunable`]. Zero is a
/// valid period; see [`crate::timer::Timer::start`] for what it means.
pub fn parse_period(payload: &str) -> Result<u32, Error> {
    let digits = payload.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidTunable);
    }
    digits.parse::<u32>().map_err(|_| Error::InvalidTunable)
}

/// Status code returned to the remote caller: 1 on success, 0 otherwise
pub fn command_result<T>(result: &Result<T, Error>) -> i32 {
    i32::from(result.is_ok())
}
