#![deny(unsafe_code)]
#![deny(warnings)]
//! Standby entry and wake-up sources
//!
//! Standby is the deepest mode of the STM32F405: SRAM and registers are
//! lost, only the backup domain (RTC, backup SRAM) survives, and every
//! wake-up is a reset. Two sources are armed before entry:
//!
//! - the WKUP pin (PA0, LIS331 INT1) for wake-on-motion
//! - the RTC wake-up timer for the periodic wake
//!
//! The IWDG keeps running in standby on this part and nothing pets it
//! there, so the wake period plus one heartbeat must stay below the
//! watchdog timeout. `main` checks this at compile time.

use cortex_m::peripheral::SCB;
use defmt::{info, warn};
use stm32_metapac as pac;

/// RTC write-protection unlock sequence
const RTC_UNLOCK: [u8; 2] = [0xCA, 0x53];
const RTC_LOCK: u8 = 0xFF;

/// WUCKSEL = ck_spre, the 1 Hz calendar clock
const WUCKSEL_CK_SPRE: u8 = 0b100;

/// Polls of RTC_ISR.WUTWF before giving up
const WUTWF_SPINS: u32 = 100_000;

/// Whether this boot is a wake-up from standby; clears the flag
pub fn woke_from_standby() -> bool {
    let standby = pac::PWR.csr1().read().sbf();
    if standby {
        pac::PWR.cr1().modify(|w| w.set_csbf(true));
    }
    standby
}

/// Program the RTC wake-up timer for `secs` seconds (1..=65536)
fn arm_rtc_wakeup(secs: u32) -> bool {
    let rtc = pac::RTC;
    for key in RTC_UNLOCK {
        rtc.wpr().write(|w| w.set_key(key));
    }

    rtc.cr().modify(|w| {
        w.set_wutie(false);
        w.set_wute(false);
    });
    let writable = (0..WUTWF_SPINS).any(|_| rtc.isr().read().wutwf());
    if writable {
        let reload = secs.clamp(1, 65_536) - 1;
        rtc.wutr().write(|w| w.set_wut(reload as u16));
        rtc.cr().modify(|w| {
            w.set_wucksel(pac::rtc::vals::Wucksel::from_bits(WUCKSEL_CK_SPRE));
            w.set_wutie(true);
            w.set_wute(true);
        });
        rtc.isr().modify(|w| w.set_wutf(false));
    }

    rtc.wpr().write(|w| w.set_key(RTC_LOCK));
    writable
}

/// Arm both wake-up sources and enter standby
///
/// Does not return: the next instruction executed is the reset vector.
pub fn enter_standby(scb: &mut SCB, wake_after_secs: u32) -> ! {
    if arm_rtc_wakeup(wake_after_secs) {
        info!("Standby, RTC wake-up in {} s", wake_after_secs);
    } else {
        warn!("RTC wake-up timer not writable, standby wakes on motion only");
    }

    pac::PWR.csr1().modify(|w| w.set_ewup(true));
    pac::PWR.cr1().modify(|w| {
        w.set_cwuf(true);
        w.set_pdds(pac::pwr::vals::Pdds::STANDBY_MODE);
    });
    scb.set_sleepdeep();

    loop {
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();
    }
}
