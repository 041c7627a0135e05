//! Motion sample records

pub use hal_abstractions::Axes;

/// What caused a sample to be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// Read in the motion interrupt handler
    Interrupt,
    /// Read by the high-rate sample timer while streaming
    Stream,
}

impl Origin {
    /// Single-character tag used in uplink records
    pub const fn as_char(self) -> char {
        match self {
            Self::Interrupt => 'i',
            Self::Stream => 's',
        }
    }
}

/// One timestamped accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSample {
    /// Unix seconds, 0 when the wall clock was not yet synchronized
    pub timestamp: u64,
    pub origin: Origin,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl MotionSample {
    /// Filler for unused ring slots
    pub const EMPTY: Self = Self {
        timestamp: 0,
        origin: Origin::Interrupt,
        x: 0,
        y: 0,
        z: 0,
    };

    pub const fn new(timestamp: u64, origin: Origin, axes: Axes) -> Self {
        Self {
            timestamp,
            origin,
            x: axes.x,
            y: axes.y,
            z: axes.z,
        }
    }
}

impl Default for MotionSample {
    fn default() -> Self {
        Self::EMPTY
    }
}
