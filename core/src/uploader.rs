//! Upload policy on top of [`SampleRing::drain`]

use hal_abstractions::Transport;

use crate::error::Error;
use crate::ring::SampleRing;

/// Running totals kept by a [`SampleUploader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UploadStats {
    pub passes: u32,
    pub records_sent: u32,
    /// Passes that ended before their batch was sent
    pub failed_passes: u32,
}

/// Drains the ring in fixed-size batches
///
/// Regular passes only run once more than one batch is waiting, so the
/// uplink is not opened for every handful of samples. [`Self::flush`]
/// skips that threshold for the pre-sleep flush.
pub struct SampleUploader<'a> {
    ring: &'a SampleRing<'a>,
    batch: usize,
    stats: UploadStats,
}

impl<'a> SampleUploader<'a> {
    pub fn new(ring: &'a SampleRing<'a>, batch: usize) -> Self {
        Self {
            ring,
            batch: batch.max(1),
            stats: UploadStats::default(),
        }
    }

    pub fn is_due(&self) -> bool {
        self.ring.pending_entries() > self.batch
    }

    /// Send one batch if enough records are waiting
    pub async fn service<T: Transport>(&mut self, transport: &mut T) -> Result<usize, Error> {
        if !self.is_due() {
            return Ok(0);
        }
        self.pass(self.batch, transport).await
    }

    /// Send up to `max_entries` records regardless of the batch threshold
    pub async fn flush<T: Transport>(
        &mut self,
        max_entries: usize,
        transport: &mut T,
    ) -> Result<usize, Error> {
        self.pass(max_entries, transport).await
    }

    async fn pass<T: Transport>(
        &mut self,
        max_entries: usize,
        transport: &mut T,
    ) -> Result<usize, Error> {
        let requested = self.ring.pending_entries().min(max_entries);
        if requested == 0 {
            return Ok(0);
        }

        self.stats.passes = self.stats.passes.wrapping_add(1);
        let result = self.ring.drain(max_entries, transport).await;
        let sent = result.unwrap_or(0);

        self.stats.records_sent = self.stats.records_sent.wrapping_add(sent as u32);
        if sent < requested {
            self.stats.failed_passes = self.stats.failed_passes.wrapping_add(1);
        }
        debug!(
            "upload pass {}: {}/{} records, {} left",
            self.stats.passes,
            sent,
            requested,
            self.ring.pending_entries()
        );
        result
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    pub fn batch(&self) -> usize {
        self.batch
    }
}
