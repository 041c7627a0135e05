//! RTC (Real-Time Clock) wrapper and timestamp operations
//!
//! Provides safe access to the STM32 hardware RTC and tracks whether its
//! time can be trusted.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use critical_section::Mutex;
use defmt::{info, warn, Format};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc};
use hal_abstractions::Clock;
use motion_core::calendar::{CivilTime, SECONDS_PER_DAY};

/// The RTC holds a time that came from NTP, this boot or an earlier one
static TIME_SYNCED: AtomicBool = AtomicBool::new(false);

/// Global internal RTC instance
static RTC: Mutex<RefCell<Option<Rtc>>> = Mutex::new(RefCell::new(None));

/// Oldest year a running RTC is believed to have been set by NTP
///
/// The backup domain keeps the RTC counting through standby, so after a
/// wake-up the calendar is still valid although the RAM flag was lost.
const TRUSTED_YEAR: u16 = 2024;

/// Timestamp with microsecond precision
#[derive(Debug, Clone, Copy, Format)]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Convert from NTP timestamp (seconds since 1900-01-01)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        /// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
        const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        // 2^-32 second fractions to microseconds
        let micros = ((ntp_frac as u64 * 1_000_000) >> 32) as u32;
        Self::new(unix_secs, micros)
    }
}

/// RTC operation errors
#[derive(Debug, Clone, Copy, Format)]
pub enum RtcError {
    NotInitialized,
    HardwareError,
    /// Time outside the calendar range the RTC can hold
    OutOfRange,
}

/// Install the RTC
///
/// A calendar already at or past [`TRUSTED_YEAR`] is treated as
/// synchronized.
pub fn initialize_rtc(rtc: Rtc) {
    let kept = rtc
        .now()
        .map(|now| now.year() >= TRUSTED_YEAR)
        .unwrap_or(false);

    critical_section::with(|cs| {
        RTC.borrow(cs).replace(Some(rtc));
    });
    TIME_SYNCED.store(kept, Ordering::Release);

    if kept {
        info!("Internal RTC kept time through reset, clock trusted");
    } else {
        info!("Internal RTC initialized, waiting for SNTP");
    }
}

pub fn is_time_synced() -> bool {
    TIME_SYNCED.load(Ordering::Acquire)
}

/// Write timestamp to internal RTC hardware
///
/// Only sets the synchronized flag if the write succeeds.
pub fn write_rtc(timestamp: Timestamp) -> Result<(), RtcError> {
    let datetime = to_datetime(timestamp.unix_secs)?;

    critical_section::with(|cs| {
        let mut rtc = RTC.borrow(cs).borrow_mut();
        let rtc = rtc.as_mut().ok_or(RtcError::NotInitialized)?;
        rtc.set_datetime(datetime)
            .map_err(|_| RtcError::HardwareError)?;
        TIME_SYNCED.store(true, Ordering::Release);
        Ok(())
    })
}

/// Read timestamp from internal RTC hardware
///
/// Returns an error if time has not been synchronized yet.
pub fn read_rtc() -> Result<Timestamp, RtcError> {
    if !is_time_synced() {
        return Err(RtcError::NotInitialized);
    }

    critical_section::with(|cs| {
        let rtc = RTC.borrow(cs).borrow();
        let rtc = rtc.as_ref().ok_or(RtcError::NotInitialized)?;
        let datetime = rtc.now().map_err(|_| RtcError::HardwareError)?;
        // Internal RTC only has 1-second resolution
        Ok(Timestamp::new(from_datetime(&datetime), 0))
    })
}

fn to_datetime(unix_secs: u64) -> Result<DateTime, RtcError> {
    let civil = CivilTime::from_unix(unix_secs);
    DateTime::from(
        civil.year,
        civil.month,
        civil.day,
        day_of_week(unix_secs),
        civil.hour,
        civil.minute,
        civil.second,
        0,
    )
    .map_err(|_| RtcError::OutOfRange)
}

fn from_datetime(datetime: &DateTime) -> u64 {
    CivilTime {
        year: datetime.year(),
        month: datetime.month(),
        day: datetime.day(),
        hour: datetime.hour(),
        minute: datetime.minute(),
        second: datetime.second(),
    }
    .to_unix()
}

/// 1970-01-01 was a Thursday
fn day_of_week(unix_secs: u64) -> DayOfWeek {
    match (unix_secs / SECONDS_PER_DAY + 3) % 7 {
        0 => DayOfWeek::Monday,
        1 => DayOfWeek::Tuesday,
        2 => DayOfWeek::Wednesday,
        3 => DayOfWeek::Thursday,
        4 => DayOfWeek::Friday,
        5 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    }
}

/// Wall clock backed by the internal RTC
///
/// Safe to call from any priority; each read is one short critical section.
#[derive(Clone, Copy, Default)]
pub struct RtcClock;

impl Clock for RtcClock {
    fn unix_time(&self) -> Option<u64> {
        match read_rtc() {
            Ok(timestamp) => Some(timestamp.unix_secs),
            Err(RtcError::NotInitialized) => None,
            Err(e) => {
                warn!("RTC read failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_to_unix_conversion() {
        const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
        let ts = Timestamp::from_ntp(NTP_UNIX_OFFSET, 0);
        assert_eq!(ts.unix_secs, 0);
        assert_eq!(ts.micros, 0);

        let ts = Timestamp::from_ntp(NTP_UNIX_OFFSET + 10, 1 << 31);
        assert_eq!(ts.unix_secs, 10);
        assert_eq!(ts.micros, 500_000);
    }

    #[test]
    fn test_day_of_week() {
        assert!(matches!(day_of_week(0), DayOfWeek::Thursday));
        // 2017-02-12 was a Sunday
        assert!(matches!(day_of_week(1486894830), DayOfWeek::Sunday));
    }
}
