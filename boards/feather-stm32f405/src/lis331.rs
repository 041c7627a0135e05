#![deny(unsafe_code)]
#![deny(warnings)]
//! LIS331HH three-axis accelerometer over SPI
//!
//! INT1 is routed to PA0, which doubles as the standby WKUP pin, so the
//! same motion interrupt that feeds the tracker also wakes the MCU.
//!
//! Register values follow the datasheet (ST DocID 15836):
//!
//! ```text
//! CTRL_REG1  PM[2:0] DR[1:0] Zen Yen Xen
//! CTRL_REG2  BOOT HPM[1:0] FDS HPen2 HPen1 HPCF[1:0]
//! CTRL_REG3  IHL PP_OD LIR2 I2_CFG[1:0] LIR1 I1_CFG[1:0]
//! CTRL_REG4  BDU BLE FS[1:0] STsign 0 ST SIM
//! ```

use defmt::{debug, warn};
use embedded_hal::spi::{Operation, SpiDevice};
use hal_abstractions::{Axes, SensorDriver, WakeOnMotion};

const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;
const STATUS_REG: u8 = 0x27;
const OUT_X_L: u8 = 0x28;
const INT1_CFG: u8 = 0x30;
const INT1_SRC: u8 = 0x31;
const INT1_THS: u8 = 0x32;
const INT1_DURATION: u8 = 0x33;

const READ: u8 = 0x80;
const AUTO_INCREMENT: u8 = 0x40;

const DEVICE_ID: u8 = 0x32;

/// Normal mode, 400 Hz, XYZ enabled
const CTRL1_ACTIVE: u8 = 0x37;
/// Filtered data to the interrupt generator only
const CTRL2_ACTIVE: u8 = 0x10;
/// Block data update
const CTRL4_ACTIVE: u8 = 0x80;
/// High-pass filter on INT1 with the lowest cut-off
const CTRL2_INT1_FILTERED: u8 = 0x1F;
/// Latch INT1
const CTRL3_LATCH_INT1: u8 = 0x04;
/// X/Y/Z high events, OR combination (AOI = 0)
const INT1_CFG_XYZ_HIGH: u8 = 0x2A;
/// X/Y/Z high and low events, AND combination (AOI = 1)
const INT1_CFG_XYZ_HIGH_LOW: u8 = 0xAA;

const ZYXDA: u8 = 0x08;

/// Threshold and duration of the streaming-mode motion interrupt
const ACTIVE_THRESHOLD: u8 = 2;
const ACTIVE_DURATION: u8 = 1;

/// CTRL_REG1 for a low-power rate, keeping the 400 Hz DR bits and XYZ on
fn low_power_ctrl1(rate_hz: u8) -> u8 {
    let pm = match rate_hz {
        0 => 0b010, // 0.5 Hz
        1 => 0b011,
        2..=4 => 0b100,
        5..=9 => 0b101,
        _ => 0b110,
    };
    (pm << 5) | 0x10 | 0x07
}

pub struct Lis331<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Lis331<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Check the identity register; a mismatch is only logged
    pub fn probe(&mut self) -> Result<bool, SPI::Error> {
        let id = self.read_register(WHO_AM_I)?;
        if id != DEVICE_ID {
            warn!("LIS331 WHO_AM_I {=u8:#x}, expected {=u8:#x}", id, DEVICE_ID);
        }
        Ok(id == DEVICE_ID)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SPI::Error> {
        self.spi.write(&[register, value])
    }

    fn read_register(&mut self, register: u8) -> Result<u8, SPI::Error> {
        let mut value = [0u8];
        self.spi.transaction(&mut [
            Operation::Write(&[READ | register]),
            Operation::Read(&mut value),
        ])?;
        Ok(value[0])
    }
}

impl<SPI: SpiDevice> SensorDriver for Lis331<SPI> {
    type Error = SPI::Error;

    fn configure_active(&mut self) -> Result<(), Self::Error> {
        self.write_register(CTRL_REG1, CTRL1_ACTIVE)?;
        self.write_register(CTRL_REG2, CTRL2_ACTIVE)?;
        self.write_register(CTRL_REG4, CTRL4_ACTIVE)?;
        debug!("LIS331 active at 400 Hz");
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Axes, Self::Error> {
        let mut raw = [0u8; 6];
        self.spi.transaction(&mut [
            Operation::Write(&[READ | AUTO_INCREMENT | OUT_X_L]),
            Operation::Read(&mut raw),
        ])?;
        Ok(Axes::new(
            i16::from_le_bytes([raw[0], raw[1]]),
            i16::from_le_bytes([raw[2], raw[3]]),
            i16::from_le_bytes([raw[4], raw[5]]),
        ))
    }

    fn data_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_register(STATUS_REG)? & ZYXDA != 0)
    }

    fn arm_interrupt(&mut self) -> Result<(), Self::Error> {
        self.write_register(INT1_CFG, 0)?;
        self.write_register(CTRL_REG3, 0)?;
        self.clear_interrupt()?;

        self.write_register(INT1_THS, ACTIVE_THRESHOLD)?;
        self.write_register(INT1_DURATION, ACTIVE_DURATION)?;
        self.write_register(CTRL_REG3, CTRL3_LATCH_INT1)?;
        self.write_register(CTRL_REG2, CTRL2_INT1_FILTERED)?;
        self.write_register(INT1_CFG, INT1_CFG_XYZ_HIGH_LOW)
    }

    fn disarm_interrupt(&mut self) -> Result<(), Self::Error> {
        self.write_register(INT1_CFG, 0)
    }

    fn clear_interrupt(&mut self) -> Result<(), Self::Error> {
        // Reading INT1_SRC releases the latch
        self.read_register(INT1_SRC).map(|_| ())
    }

    fn enter_low_power(&mut self, wake: WakeOnMotion) -> Result<(), Self::Error> {
        self.write_register(CTRL_REG1, low_power_ctrl1(wake.rate_hz))?;
        self.write_register(INT1_THS, wake.threshold)?;
        self.write_register(INT1_DURATION, wake.duration)?;
        self.write_register(INT1_CFG, INT1_CFG_XYZ_HIGH)?;
        self.clear_interrupt()?;
        debug!(
            "LIS331 low power at {} Hz, threshold {}",
            wake.rate_hz, wake.threshold
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_power_ctrl1() {
        assert_eq!(low_power_ctrl1(5), 0xB7);
        assert_eq!(low_power_ctrl1(0), 0x57);
        assert_eq!(low_power_ctrl1(10), 0xD7);
        assert_eq!(low_power_ctrl1(200), 0xD7);
    }
}
