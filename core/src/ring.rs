//! Fixed-capacity sample ring drained over a network transport
//!
//! Single producer (the motion interrupt and the stream timer), single
//! consumer (the upload task). One slot is always left unused so that
//! `head == tail` unambiguously means empty; a ring of `N` slots holds at
//! most `N - 1` samples.
//!
//! Index read-modify-writes run inside `critical_section::with`. The
//! consumer snapshots `tail` once per pass, copies each sample out in its
//! own short critical section, and awaits the transport with no critical
//! section held. The producer never writes into `head..tail`, so those
//! copies are stable while the consumer works.

use core::cell::RefCell;

use critical_section::Mutex;
use hal_abstractions::Transport;

use crate::error::Error;
use crate::record::format_sample;
use crate::sample::MotionSample;

struct RingState<'a> {
    slots: &'a mut [MotionSample],
    /// Next slot to consume
    head: usize,
    /// Next slot to write
    tail: usize,
}

impl RingState<'_> {
    fn pending(&self) -> usize {
        let capacity = self.slots.len();
        (self.tail + capacity - self.head) % capacity
    }
}

/// Circular buffer of motion samples
pub struct SampleRing<'a> {
    state: Mutex<RefCell<RingState<'a>>>,
    capacity: usize,
}

impl<'a> SampleRing<'a> {
    /// Build a ring over caller-provided storage
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] when `storage` has fewer than two
    /// slots.
    pub fn new(storage: &'a mut [MotionSample]) -> Result<Self, Error> {
        let capacity = storage.len();
        if capacity < 2 {
            return Err(Error::InvalidCapacity);
        }

        Ok(Self {
            state: Mutex::new(RefCell::new(RingState {
                slots: storage,
                head: 0,
                tail: 0,
            })),
            capacity,
        })
    }

    /// Append a sample. Safe to call from interrupt context.
    ///
    /// Returns `false` and leaves the ring untouched when it is full; the
    /// newest sample is the one dropped.
    pub fn push(&self, sample: MotionSample) -> bool {
        let stored = critical_section::with(|cs| {
            let mut ring = self.state.borrow_ref_mut(cs);
            let next = (ring.tail + 1) % self.capacity;
            if next == ring.head {
                return false;
            }
            let tail = ring.tail;
            ring.slots[tail] = sample;
            ring.tail = next;
            true
        });

        if !stored {
            error!("ring buffer full ({} pending), dropping sample", self.capacity - 1);
        }
        stored
    }

    /// Send up to `max_entries` samples, oldest first, over `transport`
    ///
    /// Connects first if needed. Stops at the first record whose write does
    /// not fully complete; `head` only moves past records that were sent in
    /// full, so anything unsent is retried on the next call. The transport
    /// is closed once the batch ends.
    ///
    /// Returns the number of records sent. Transport failures are not
    /// errors here: they end the pass early and show up in the count.
    ///
    /// # Errors
    ///
    /// [`Error::RecordOverrun`] if a record cannot be formatted. Records
    /// sent before it are still committed.
    pub async fn drain<T: Transport>(
        &self,
        max_entries: usize,
        transport: &mut T,
    ) -> Result<usize, Error> {
        let (head, live) = critical_section::with(|cs| {
            let ring = self.state.borrow_ref(cs);
            (ring.head, ring.pending())
        });

        let batch = live.min(max_entries);
        if batch == 0 {
            trace!("ring empty, nothing to send");
            return Ok(0);
        }

        if !transport.is_connected() {
            info!("connecting uplink");
            if transport.connect().await.is_err() {
                warn!("cannot connect uplink: {}", Error::TransportUnavailable);
                return Ok(0);
            }
        }

        debug!("sending {} of {} pending records", batch, live);
        let mut sent = 0;
        let mut overrun = None;
        for offset in 0..batch {
            let index = (head + offset) % self.capacity;
            let sample = critical_section::with(|cs| self.state.borrow_ref(cs).slots[index]);

            let line = match format_sample(&sample) {
                Ok(line) => line,
                Err(e) => {
                    error!("record {} overran its line buffer", index);
                    overrun = Some(e);
                    break;
                }
            };

            match transport.write(line.as_bytes()).await {
                Ok(written) if written == line.len() => {
                    trace!("sent record {} (index {})", offset, index);
                    sent += 1;
                }
                Ok(written) => {
                    warn!(
                        "{}: {}/{} bytes of record {}, will try again later",
                        Error::PartialWrite,
                        written,
                        line.len(),
                        offset
                    );
                    break;
                }
                Err(_) => {
                    warn!(
                        "{}: write of record {} failed, will try again later",
                        Error::TransportUnavailable,
                        offset
                    );
                    break;
                }
            }
        }

        trace!("done sending, closing uplink");
        transport.close().await;
        self.advance_head(sent);

        match overrun {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    fn advance_head(&self, count: usize) {
        if count == 0 {
            return;
        }
        critical_section::with(|cs| {
            let mut ring = self.state.borrow_ref_mut(cs);
            ring.head = (ring.head + count) % self.capacity;
        });
    }

    /// Samples waiting to be sent
    pub fn pending_entries(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).pending())
    }

    /// Samples that can still be pushed before the ring is full
    pub fn space_remaining(&self) -> usize {
        self.capacity - 1 - self.pending_entries()
    }

    /// Total slots, including the one kept unused
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Same as [`Self::pending_entries`]
    pub fn entries(&self) -> usize {
        self.pending_entries()
    }

    /// `capacity() - entries()`, the cyclic complement of [`Self::entries`]
    pub fn remaining(&self) -> usize {
        self.capacity - self.entries()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_entries() == 0
    }

    pub fn is_full(&self) -> bool {
        self.space_remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::sample::{Axes, Origin};
    use crate::testing::MockTransport;

    fn sample(n: i16) -> MotionSample {
        MotionSample::new(1486894830, Origin::Interrupt, Axes::new(n, n, n))
    }

    fn assert_accounting(ring: &SampleRing<'_>) {
        assert!(ring.pending_entries() <= ring.capacity() - 1);
        assert_eq!(ring.entries() + ring.remaining(), ring.capacity());
        assert_eq!(ring.pending_entries() + ring.space_remaining(), ring.capacity() - 1);
    }

    #[test]
    fn test_rejects_tiny_capacity() {
        let mut none: [MotionSample; 0] = [];
        assert_eq!(SampleRing::new(&mut none).err(), Some(Error::InvalidCapacity));
        let mut one = [MotionSample::EMPTY; 1];
        assert_eq!(SampleRing::new(&mut one).err(), Some(Error::InvalidCapacity));
        let mut two = [MotionSample::EMPTY; 2];
        let ring = SampleRing::new(&mut two).unwrap();
        assert!(ring.push(sample(1)));
        assert!(!ring.push(sample(2)));
    }

    #[test]
    fn test_full_ring_then_drain_frees_space() {
        let mut storage = [MotionSample::EMPTY; 4];
        let ring = SampleRing::new(&mut storage).unwrap();

        assert!(ring.push(sample(1)));
        assert!(ring.push(sample(2)));
        assert!(ring.push(sample(3)));
        assert_accounting(&ring);
        assert!(ring.is_full());

        assert!(!ring.push(sample(4)));
        assert_eq!(ring.pending_entries(), 3);

        let mut transport = MockTransport::new();
        assert_eq!(block_on(ring.drain(2, &mut transport)), Ok(2));
        assert_eq!(transport.lines.len(), 2);
        assert!(transport.lines[0].ends_with(",i,1,1,1\n"));
        assert!(transport.lines[1].ends_with(",i,2,2,2\n"));
        assert_eq!(ring.pending_entries(), 1);
        assert!(!transport.is_connected());

        assert!(ring.push(sample(4)));
        assert_eq!(ring.pending_entries(), 2);
        assert_accounting(&ring);
    }

    #[test]
    fn test_drain_without_connection_keeps_everything() {
        let mut storage = [MotionSample::EMPTY; 8];
        let ring = SampleRing::new(&mut storage).unwrap();
        ring.push(sample(1));
        ring.push(sample(2));

        let mut transport = MockTransport::new();
        transport.refuse_connect = true;
        assert_eq!(block_on(ring.drain(8, &mut transport)), Ok(0));
        assert_eq!(ring.pending_entries(), 2);
        assert_eq!(transport.connect_attempts, 1);
        assert!(transport.lines.is_empty());
    }

    #[test]
    fn test_partial_write_stops_before_failed_record() {
        let mut storage = [MotionSample::EMPTY; 8];
        let ring = SampleRing::new(&mut storage).unwrap();
        for n in 1..=5 {
            ring.push(sample(n));
        }

        let mut transport = MockTransport::new();
        transport.short_write_at = Some(2);
        assert_eq!(block_on(ring.drain(5, &mut transport)), Ok(2));
        assert_eq!(ring.pending_entries(), 3);
        assert_eq!(transport.closes, 1);

        // retry resumes at the record that failed
        let mut transport = MockTransport::new();
        assert_eq!(block_on(ring.drain(5, &mut transport)), Ok(3));
        assert!(transport.lines[0].ends_with(",i,3,3,3\n"));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_write_error_counts_only_completed_records() {
        let mut storage = [MotionSample::EMPTY; 8];
        let ring = SampleRing::new(&mut storage).unwrap();
        for n in 1..=4 {
            ring.push(sample(n));
        }

        let mut transport = MockTransport::new();
        transport.fail_write_at = Some(0);
        assert_eq!(block_on(ring.drain(4, &mut transport)), Ok(0));
        assert_eq!(ring.pending_entries(), 4);
    }

    #[test]
    fn test_drain_wraps_around_the_end() {
        let mut storage = [MotionSample::EMPTY; 4];
        let ring = SampleRing::new(&mut storage).unwrap();
        let mut transport = MockTransport::new();

        for round in 0..5 {
            assert!(ring.push(sample(round * 2)));
            assert!(ring.push(sample(round * 2 + 1)));
            assert_eq!(block_on(ring.drain(usize::MAX, &mut transport)), Ok(2));
            assert_accounting(&ring);
        }
        assert_eq!(transport.lines.len(), 10);
        for (n, line) in transport.lines.iter().enumerate() {
            assert!(line.ends_with(&std::format!(",i,{n},{n},{n}\n")));
        }
    }

    #[test]
    fn test_empty_ring_does_not_touch_transport() {
        let mut storage = [MotionSample::EMPTY; 4];
        let ring = SampleRing::new(&mut storage).unwrap();
        let mut transport = MockTransport::new();
        assert_eq!(block_on(ring.drain(10, &mut transport)), Ok(0));
        assert_eq!(transport.connect_attempts, 0);
        assert_eq!(transport.closes, 0);
    }
}
