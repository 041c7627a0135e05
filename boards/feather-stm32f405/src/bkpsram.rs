//! Backup SRAM durable store
//!
//! This module is the **ONLY** place in the codebase that touches backup
//! SRAM through raw pointers. Every other module keeps
//! `#![deny(unsafe_code)]`.
//!
//! # Backup SRAM Characteristics (STM32F405RG)
//!
//! - **Size**: 4 KB (0x4002_4000 - 0x4002_4FFF)
//! - **Retention**: kept through standby and, with the backup regulator
//!   on, on VBAT alone
//! - **Access**: byte, half-word and word; needs backup domain write
//!   access (PWR_CR.DBP)
//!
//! # Current Allocations
//!
//! ```text
//! 0x000  activity digest image (16 B header + 1440 x u16 counters = 2896 B)
//! ```
//!
//! The layout of the image is owned by `motion_core::persist`; this module
//! only moves bytes.

#![allow(unsafe_code)]
#![deny(warnings)]

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn, Format};
use hal_abstractions::DurableStore;
use stm32_metapac as pac;

const BASE: usize = 0x4002_4000;

/// Backup SRAM size in bytes
pub const SIZE: usize = 4096;

/// Polls of PWR_CSR.BRR before giving up on the backup regulator
const REGULATOR_SPINS: u32 = 100_000;

static TAKEN: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, Format)]
pub enum BackupSramError {
    /// Access outside 0..SIZE
    OutOfBounds,
}

/// Exclusive handle to backup SRAM
pub struct BackupSram {
    _private: (),
}

impl BackupSram {
    /// Enable backup SRAM and hand out the only handle
    ///
    /// Returns `None` on a second call.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }

        pac::RCC.ahb1enr().modify(|w| w.set_bkpsramen(true));
        pac::PWR.cr1().modify(|w| w.set_dbp(true));
        pac::PWR.csr1().modify(|w| w.set_bre(true));

        let ready = (0..REGULATOR_SPINS).any(|_| pac::PWR.csr1().read().brr());
        if ready {
            info!("Backup SRAM enabled with backup regulator");
        } else {
            warn!("Backup regulator not ready, contents survive standby only");
        }
        Some(Self { _private: () })
    }

    fn check(offset: usize, len: usize) -> Result<(), BackupSramError> {
        match offset.checked_add(len) {
            Some(end) if end <= SIZE => Ok(()),
            _ => Err(BackupSramError::OutOfBounds),
        }
    }
}

impl DurableStore for BackupSram {
    type Error = BackupSramError;

    fn capacity(&self) -> usize {
        SIZE
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        Self::check(offset, buf.len())?;
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: BASE + offset + i lies inside the 4 KiB backup SRAM
            // (checked above), the clock is enabled in take(), and this
            // handle is the only accessor.
            *byte = unsafe { core::ptr::read_volatile((BASE + offset + i) as *const u8) };
        }
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        Self::check(offset, data.len())?;
        for (i, byte) in data.iter().enumerate() {
            // SAFETY: as in read(); DBP was set in take()
            unsafe { core::ptr::write_volatile((BASE + offset + i) as *mut u8, *byte) };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(BackupSram::check(0, SIZE).is_ok());
        assert!(BackupSram::check(SIZE - 2, 2).is_ok());
        assert!(BackupSram::check(SIZE - 1, 2).is_err());
        assert!(BackupSram::check(usize::MAX, 2).is_err());
    }
}
