//! Wall-clock time for sample timestamps and the activity digest
//!
//! ## Architecture
//! - SNTP (see `network::sntp`) writes the hardware RTC after boot and every
//!   15 minutes
//! - Between syncs, timestamps are read back from the RTC at 1-second
//!   resolution
//! - The RTC lives in the backup domain and keeps counting through standby,
//!   so a wake-up does not lose wall-clock time
//! - [`RtcClock`] exposes the RTC to `motion-core` through the `Clock`
//!   capability; it reports `None` until the RTC is trusted
//!
//! Calendar math is shared with `motion-core` (`motion_core::calendar`).

#![deny(unsafe_code)]
#![deny(warnings)]

mod rtc;

pub use rtc::{initialize_rtc, is_time_synced, write_rtc, RtcClock, RtcError, Timestamp};
