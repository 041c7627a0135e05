//! Per-minute activity histogram with a resumable upload cursor
//!
//! One `u16` counter per minute of the day. `active` is the minute touched
//! most recently and `last_uploaded` the last minute confirmed published;
//! the backlog is the cyclic run `last_uploaded + 1 ..= active`.
//!
//! Counters and cursors are shared with interrupt context and live behind a
//! critical-section mutex, same as the sample ring.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{DurableStore, Publisher};

use crate::config::DigestConfig;
use crate::error::Error;
use crate::persist::{image_len, DigestHeader, BLOCK_SLOTS, HEADER_LEN};
use crate::record::ChunkWriter;

struct DigestState<'a> {
    counters: &'a mut [u16],
    active: Option<u16>,
    last_uploaded: Option<u16>,
}

impl DigestState<'_> {
    fn pending(&self) -> usize {
        let slots = self.counters.len();
        match (self.active, self.last_uploaded) {
            (Some(active), Some(last)) => {
                (usize::from(active) + slots - usize::from(last)) % slots
            }
            _ => 0,
        }
    }
}

/// Activity counters for every minute of the day
pub struct ActivityDigest<'a> {
    state: Mutex<RefCell<DigestState<'a>>>,
    slots: usize,
    config: DigestConfig,
}

impl<'a> ActivityDigest<'a> {
    /// Build an empty digest over caller-provided counters
    ///
    /// The counters are zeroed; call [`Self::restore`] to pick up a
    /// previously persisted image.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSlotCount`] when `counters` is empty or too long to
    /// be indexed by a `u16` minute, [`Error::InvalidChunking`] when
    /// `config` cannot produce a well-formed chunk.
    pub fn new(counters: &'a mut [u16], config: &DigestConfig) -> Result<Self, Error> {
        let slots = counters.len();
        if slots == 0 || slots > usize::from(u16::MAX) {
            return Err(Error::InvalidSlotCount);
        }
        config.validate()?;

        counters.fill(0);
        Ok(Self {
            state: Mutex::new(RefCell::new(DigestState {
                counters,
                active: None,
                last_uploaded: None,
            })),
            slots,
            config: *config,
        })
    }

    /// Count one activity event in `minute`. Safe to call from interrupt
    /// context.
    ///
    /// The first event ever recorded also sets the upload baseline, so it
    /// does not show up as a full day of backlog.
    pub fn record_activity(&self, minute: u16) {
        if usize::from(minute) >= self.slots {
            warn!("minute {} outside digest of {} slots, ignored", minute, self.slots);
            return;
        }

        let count = critical_section::with(|cs| {
            let mut digest = self.state.borrow_ref_mut(cs);
            let slot = &mut digest.counters[usize::from(minute)];
            *slot = slot.saturating_add(1);
            let count = *slot;

            if digest.last_uploaded.is_none() {
                digest.last_uploaded = Some(minute);
            }
            digest.active = Some(minute);
            count
        });

        trace!("minute {} now at {}", minute, count);
    }

    /// Publish up to `max_entries` minutes of backlog, oldest first
    ///
    /// Waits a bounded time for `publisher` to come online, then sends the
    /// backlog as [`ChunkWriter`] chunks spaced by the configured publish
    /// delay. `last_uploaded` moves only at chunk boundaries, so a failed
    /// pass resumes at the start of the chunk that failed.
    ///
    /// Returns `true` when every requested minute was published, including
    /// the case where nothing was pending.
    pub async fn publish_backlog<P: Publisher, D: DelayNs>(
        &self,
        max_entries: usize,
        publisher: &mut P,
        delay: &mut D,
    ) -> bool {
        let (last_uploaded, pending) = critical_section::with(|cs| {
            let digest = self.state.borrow_ref(cs);
            (digest.last_uploaded, digest.pending())
        });

        let requested = pending.min(max_entries);
        let Some(mut minute) = last_uploaded.filter(|_| requested > 0) else {
            trace!("no activity backlog");
            return true;
        };

        if !self.wait_for_connection(publisher, delay).await {
            warn!(
                "{}: publisher offline after {} ms, backlog kept",
                Error::TransportUnavailable,
                self.config.connect_wait_ms
            );
            return false;
        }

        debug!("publishing {} of {} backlog minutes", requested, pending);
        let mut chunk = ChunkWriter::new(self.config.chunk_budget, self.config.max_minutes_per_chunk);
        let mut visited = 0;
        while visited < requested {
            minute = self.next_minute(minute);
            let count = self.count_at(minute).unwrap_or(0);
            if chunk.push(minute, count).is_err() {
                error!("chunk buffer overrun at minute {}", minute);
                return false;
            }
            visited += 1;

            if !chunk.is_full() && visited < requested {
                continue;
            }

            debug!("publishing '{}'", chunk.as_str());
            let published = publisher.is_connected()
                && publisher
                    .publish(self.config.channel, chunk.as_bytes())
                    .await
                    .is_ok();
            if !published {
                warn!(
                    "publish of chunk at minute {} failed; last uploaded stays {}",
                    chunk.first_minute(),
                    self.last_uploaded()
                );
                return false;
            }

            critical_section::with(|cs| {
                self.state.borrow_ref_mut(cs).last_uploaded = Some(minute);
            });
            chunk.clear();

            if visited < requested {
                delay.delay_ms(self.config.publish_delay_ms).await;
            }
        }

        info!("backlog published up to minute {}", minute);
        true
    }

    async fn wait_for_connection<P: Publisher, D: DelayNs>(
        &self,
        publisher: &P,
        delay: &mut D,
    ) -> bool {
        let mut waited: u32 = 0;
        while !publisher.is_connected() {
            if waited >= self.config.connect_wait_ms {
                return false;
            }
            delay.delay_ms(self.config.connect_poll_ms).await;
            waited = waited.saturating_add(self.config.connect_poll_ms);
        }
        true
    }

    fn next_minute(&self, minute: u16) -> u16 {
        // slots never exceeds u16::MAX, so the wrapped index fits
        ((usize::from(minute) + 1) % self.slots) as u16
    }

    /// Minutes awaiting upload
    pub fn entries(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).pending())
    }

    /// Number of minute slots
    pub fn capacity(&self) -> usize {
        self.slots
    }

    pub fn remaining(&self) -> usize {
        self.slots - self.entries()
    }

    pub fn active(&self) -> Option<u16> {
        critical_section::with(|cs| self.state.borrow_ref(cs).active)
    }

    pub fn last_uploaded(&self) -> Option<u16> {
        critical_section::with(|cs| self.state.borrow_ref(cs).last_uploaded)
    }

    /// Counter for `minute`, `None` when out of range
    pub fn count_at(&self, minute: u16) -> Option<u16> {
        critical_section::with(|cs| {
            self.state
                .borrow_ref(cs)
                .counters
                .get(usize::from(minute))
                .copied()
        })
    }

    /// Load counters and cursors from `store`
    ///
    /// Returns `Ok(false)` and keeps the digest empty when the store holds
    /// no usable image.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] when the store is too small or a read fails. The
    /// digest is left empty in that case.
    pub fn restore<S: DurableStore>(&self, store: &mut S) -> Result<bool, Error> {
        self.check_store(store)?;

        let mut raw = [0u8; HEADER_LEN];
        store.read(0, &mut raw).map_err(|_| Error::Storage)?;
        let header = match DigestHeader::decode(&raw, self.slots as u16) {
            Ok(header) => header,
            Err(reason) => {
                info!("no usable digest image ({}), starting fresh", reason);
                return Ok(false);
            }
        };

        let mut block = [0u8; BLOCK_SLOTS * 2];
        let mut first = 0;
        while first < self.slots {
            let len = (self.slots - first).min(BLOCK_SLOTS);
            let bytes = &mut block[..len * 2];
            if store.read(HEADER_LEN + first * 2, bytes).is_err() {
                error!("digest image unreadable at slot {}", first);
                self.clear();
                return Err(Error::Storage);
            }

            critical_section::with(|cs| {
                let mut digest = self.state.borrow_ref_mut(cs);
                for (i, pair) in bytes.chunks_exact(2).enumerate() {
                    digest.counters[first + i] = u16::from_le_bytes([pair[0], pair[1]]);
                }
            });
            first += len;
        }

        let pending = critical_section::with(|cs| {
            let mut digest = self.state.borrow_ref_mut(cs);
            digest.active = header.active;
            digest.last_uploaded = header.last_uploaded;
            digest.pending()
        });

        info!(
            "digest restored: active {}, last uploaded {}, {} minutes pending",
            header.active,
            header.last_uploaded,
            pending
        );
        Ok(true)
    }

    /// Write counters and cursors to `store`
    ///
    /// The header goes last, so an interrupted write never pairs a fresh
    /// header with stale counters from a previous layout.
    pub fn persist<S: DurableStore>(&self, store: &mut S) -> Result<(), Error> {
        self.check_store(store)?;

        let header = critical_section::with(|cs| {
            let digest = self.state.borrow_ref(cs);
            DigestHeader {
                slots: self.slots as u16,
                active: digest.active,
                last_uploaded: digest.last_uploaded,
            }
        });

        let mut block = [0u8; BLOCK_SLOTS * 2];
        let mut first = 0;
        while first < self.slots {
            let len = (self.slots - first).min(BLOCK_SLOTS);
            critical_section::with(|cs| {
                let digest = self.state.borrow_ref(cs);
                for (i, count) in digest.counters[first..first + len].iter().enumerate() {
                    block[i * 2..i * 2 + 2].copy_from_slice(&count.to_le_bytes());
                }
            });
            store
                .write(HEADER_LEN + first * 2, &block[..len * 2])
                .map_err(|_| Error::Storage)?;
            first += len;
        }

        store.write(0, &header.encode()).map_err(|_| Error::Storage)?;
        debug!("digest persisted ({} bytes)", image_len(self.slots));
        Ok(())
    }

    fn check_store<S: DurableStore>(&self, store: &S) -> Result<(), Error> {
        let needed = image_len(self.slots);
        if store.capacity() < needed {
            error!(
                "durable store holds {} bytes, digest needs {}",
                store.capacity(),
                needed
            );
            return Err(Error::Storage);
        }
        Ok(())
    }

    fn clear(&self) {
        critical_section::with(|cs| {
            let mut digest = self.state.borrow_ref_mut(cs);
            digest.counters.fill(0);
            digest.active = None;
            digest.last_uploaded = None;
        });
    }

    /// Log every minute with recorded activity
    pub fn log_summary(&self) {
        info!(
            "digest: active {}, last uploaded {}, {} pending",
            self.active(),
            self.last_uploaded(),
            self.entries()
        );
        for minute in 0..self.slots as u16 {
            match self.count_at(minute) {
                Some(0) | None => {}
                Some(count) => info!("  minute {} = {}", minute, count),
            }
        }
    }
}
