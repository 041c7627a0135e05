//! Tracker configuration structures

use hal_abstractions::WakeOnMotion;

use crate::calendar::MINUTES_PER_DAY;
use crate::error::Error;
use crate::record::{CHUNK_CAPACITY, CHUNK_RESERVE, MAX_LEAD_FIELD};

/// Ring slots allocated by the firmware (100 samples/s for ~5 s)
pub const RING_CAPACITY: usize = 512;

/// One digest slot per minute of the day
pub const DIGEST_SLOTS: usize = MINUTES_PER_DAY as usize;

/// Activity digest publishing parameters
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigestConfig {
    /// Pub/sub channel the backlog is published on
    pub channel: &'static str,
    /// Byte budget of one published chunk, terminator included
    pub chunk_budget: usize,
    /// Upper bound on minutes carried by one chunk
    pub max_minutes_per_chunk: usize,
    /// How long to wait for the publisher to come online
    pub connect_wait_ms: u32,
    /// Poll period while waiting for the publisher
    pub connect_poll_ms: u32,
    /// Minimum spacing between two publishes (broker rate limit)
    pub publish_delay_ms: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            channel: "activity",
            chunk_budget: 256,
            max_minutes_per_chunk: 30,
            connect_wait_ms: 10_000,
            connect_poll_ms: 100,
            publish_delay_ms: 1_000,
        }
    }
}

impl DigestConfig {
    /// Reject parameters that could not produce a well-formed chunk
    pub fn validate(&self) -> Result<(), Error> {
        let budget_ok = self.chunk_budget > MAX_LEAD_FIELD + CHUNK_RESERVE
            && self.chunk_budget <= CHUNK_CAPACITY;
        if !budget_ok || self.max_minutes_per_chunk == 0 || self.connect_poll_ms == 0 {
            return Err(Error::InvalidChunking);
        }
        Ok(())
    }

    /// Fewest minutes a chunk carries before it is full
    ///
    /// After the leading field every minute adds at most six bytes.
    pub fn min_minutes_per_chunk(&self) -> usize {
        let spare = self
            .chunk_budget
            .saturating_sub(MAX_LEAD_FIELD + CHUNK_RESERVE);
        (1 + spare / 6).min(self.max_minutes_per_chunk).max(1)
    }

    /// Longest a backlog pass over `max_entries` minutes can take when each
    /// publish returns within `publish_timeout_ms`
    pub fn pass_bound_ms(&self, max_entries: usize, publish_timeout_ms: u64) -> u64 {
        let chunks = max_entries.div_ceil(self.min_minutes_per_chunk()) as u64;
        let wait = u64::from(self.connect_wait_ms) + u64::from(self.connect_poll_ms);
        wait + chunks * (publish_timeout_ms + u64::from(self.publish_delay_ms))
    }
}

/// Motion tracker configuration
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackerConfig {
    /// No motion for this long puts the device to sleep
    pub sleep_timeout_ms: u32,
    /// How long high-rate streaming continues after the last interrupt
    pub streaming_window_ms: u32,
    /// High-rate sample period while streaming
    pub sample_interval_ms: u32,
    /// Records sent per regular upload pass
    pub upload_batch: usize,
    /// Upper bound on records flushed before sleeping, one upload session
    pub flush_limit: usize,
    /// How often the activity backlog is published
    pub digest_publish_interval_ms: u32,
    /// Upper bound on backlog minutes published per pass
    pub backlog_minutes_per_pass: usize,
    /// Periodic wake-up while in deep sleep
    pub wake_after_secs: u32,
    /// Sensor low-power settings used while asleep
    pub wake_on_motion: WakeOnMotion,
    pub digest: DigestConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sleep_timeout_ms: 30_000,
            streaming_window_ms: 1_000,
            sample_interval_ms: 10,
            upload_batch: 128,
            flush_limit: 128,
            digest_publish_interval_ms: 3_600_000,
            backlog_minutes_per_pass: 240,
            wake_after_secs: 60,
            wake_on_motion: WakeOnMotion::default(),
            digest: DigestConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.sleep_timeout_ms, 30_000);
        assert_eq!(config.streaming_window_ms, 1_000);
        assert_eq!(config.sample_interval_ms, 10);
        assert_eq!(config.flush_limit, config.upload_batch);
        assert_eq!(config.digest.channel, "activity");
        assert_eq!(config.digest.publish_delay_ms, 1_000);
        assert!(config.digest.validate().is_ok());
    }

    #[test]
    fn test_backlog_pass_bound() {
        let digest = DigestConfig::default();
        assert_eq!(digest.min_minutes_per_chunk(), 30);
        // 10 s wait + 100 ms poll overshoot, 8 chunks of 5 s + 1 s
        assert_eq!(digest.pass_bound_ms(240, 5_000), 58_100);
        assert_eq!(digest.pass_bound_ms(0, 5_000), 10_100);

        let narrow = DigestConfig {
            chunk_budget: 30,
            ..DigestConfig::default()
        };
        assert_eq!(narrow.min_minutes_per_chunk(), 3);
        assert_eq!(narrow.pass_bound_ms(7, 5_000), 10_100 + 3 * 6_000);
    }

    #[test]
    fn test_chunk_budget_bounds() {
        let mut digest = DigestConfig::default();
        digest.chunk_budget = CHUNK_CAPACITY + 1;
        assert_eq!(digest.validate(), Err(Error::InvalidChunking));

        digest.chunk_budget = MAX_LEAD_FIELD + CHUNK_RESERVE;
        assert_eq!(digest.validate(), Err(Error::InvalidChunking));

        digest.chunk_budget = 64;
        digest.max_minutes_per_chunk = 0;
        assert_eq!(digest.validate(), Err(Error::InvalidChunking));
    }
}
