//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! Used to render ISO-8601 timestamps in uplink records, to map wall-clock
//! time onto the digest's minute-of-day index, and by the firmware to turn
//! RTC calendar readings back into Unix seconds.
//!
//! **Limitations**:
//! - Valid range: 1970-2105 (u16 year limit)
//! - UTC only (no timezone support)
//! - No leap seconds

use core::fmt;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Number of minute slots in one day
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Broken-down UTC calendar time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilTime {
    /// Convert a Unix timestamp to calendar time
    pub fn from_unix(unix_secs: u64) -> Self {
        let days_since_epoch = (unix_secs / SECONDS_PER_DAY) as i32;
        let secs_today = unix_secs % SECONDS_PER_DAY;

        let (year, month, day) = civil_from_days(days_since_epoch);

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }

    /// Convert back to a Unix timestamp
    pub fn to_unix(&self) -> u64 {
        let days_since_epoch = days_from_civil(self.year, self.month, self.day);

        (days_since_epoch as u64) * SECONDS_PER_DAY
            + (self.hour as u64) * 3600
            + (self.minute as u64) * 60
            + (self.second as u64)
    }
}

/// ISO-8601 extended format, UTC: `2017-02-12T10:20:30Z`
impl fmt::Display for CivilTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Minute-of-day offset (0-1439) of a Unix timestamp, UTC
pub fn minute_of_day(unix_secs: u64) -> u16 {
    ((unix_secs % SECONDS_PER_DAY) / 60) as u16
}

/// Check if year is a leap year (Gregorian calendar)
#[allow(dead_code)]
pub(crate) fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Convert days since Unix epoch to civil date (year, month, day)
fn civil_from_days(days_since_epoch: i32) -> (u16, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + 719468;

    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = (yoe as i32) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // 0 = March, 11 = February

    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
fn days_from_civil(year: u16, month: u8, day: u8) -> i32 {
    let y = year as i32;
    let m = month as i32;
    let d = day as i32;

    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (m as u32) + 2) / 5 + (d as u32) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146097 + (doe as i32) - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn test_unix_epoch() {
        let t = CivilTime::from_unix(0);
        assert_eq!((t.year, t.month, t.day), (1970, 1, 1));
        assert_eq!((t.hour, t.minute, t.second), (0, 0, 0));
    }

    #[test]
    fn test_known_dates() {
        for &unix_secs in &[0u64, 946684800, 1486894830, 1704067200, 2147483647, 4102444800] {
            assert_eq!(CivilTime::from_unix(unix_secs).to_unix(), unix_secs);
        }
    }

    #[test]
    fn test_leap_day_2024() {
        let leap_day = CivilTime {
            year: 2024,
            month: 2,
            day: 29,
            hour: 12,
            minute: 0,
            second: 0,
        };
        let t = CivilTime::from_unix(leap_day.to_unix());
        assert_eq!(t, leap_day);
    }

    #[test]
    fn test_iso8601_rendering() {
        // 2017-02-12 10:20:30 UTC
        let mut out: heapless::String<32> = heapless::String::new();
        core::fmt::write(&mut out, format_args!("{}", CivilTime::from_unix(1486894830))).unwrap();
        assert_eq!(out.as_str(), "2017-02-12T10:20:30Z");
    }

    #[test]
    fn test_minute_of_day() {
        assert_eq!(minute_of_day(0), 0);
        assert_eq!(minute_of_day(1486894830), 10 * 60 + 20);
        assert_eq!(minute_of_day(SECONDS_PER_DAY - 1), MINUTES_PER_DAY - 1);
        assert_eq!(minute_of_day(SECONDS_PER_DAY), 0);
    }
}
