//! Accelerometer capability set
//!
//! Register-level programming stays in the board crate; the tracker only
//! needs to configure, sample, gate the motion interrupt and park the part
//! in its wake-on-motion mode before the MCU suspends.

/// One three-axis reading in raw sensor counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Axes {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Axes {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }
}

/// Wake-on-motion parameters used while the MCU is suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeOnMotion {
    /// Low-power output data rate in Hz
    pub rate_hz: u8,
    /// Interrupt threshold in sensor-specific LSBs
    pub threshold: u8,
    /// Samples the threshold must be exceeded for
    pub duration: u8,
}

impl Default for WakeOnMotion {
    fn default() -> Self {
        Self {
            rate_hz: 5,
            threshold: 5,
            duration: 0,
        }
    }
}

/// Accelerometer driver
///
/// `clear_interrupt` and `read_sample` are called from interrupt context and
/// must not block beyond a single bus transaction.
pub trait SensorDriver {
    type Error: core::fmt::Debug;

    /// Put the part in its normal, full-rate measurement mode
    fn configure_active(&mut self) -> Result<(), Self::Error>;

    /// Read the latest sample
    fn read_sample(&mut self) -> Result<Axes, Self::Error>;

    /// Whether a new sample is available since the last read
    fn data_ready(&mut self) -> Result<bool, Self::Error>;

    /// Enable the motion interrupt and attach the MCU-side handler
    fn arm_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Disable the motion interrupt and detach the MCU-side handler
    fn disarm_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Clear the latched interrupt so the next edge can fire
    fn clear_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Enter low-power mode with the wake-on-motion interrupt armed
    fn enter_low_power(&mut self, wake: WakeOnMotion) -> Result<(), Self::Error>;
}
