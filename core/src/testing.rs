//! Collaborator doubles for host tests

use std::cell::Cell;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType};
use hal_abstractions::{Axes, Clock, DurableStore, Publisher, SensorDriver, Transport, WakeOnMotion};

/// Byte-stream transport that records every complete line it accepts
#[derive(Default)]
pub struct MockTransport {
    pub connected: bool,
    pub refuse_connect: bool,
    /// Write call (0-based) that only accepts half the bytes
    pub short_write_at: Option<usize>,
    /// Write call (0-based) that fails outright
    pub fail_write_at: Option<usize>,
    pub connect_attempts: usize,
    pub closes: usize,
    pub writes: usize,
    pub lines: Vec<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorType for MockTransport {
    type Error = ErrorKind;
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_attempts += 1;
        if self.refuse_connect {
            return Err(ErrorKind::ConnectionRefused);
        }
        self.connected = true;
        Ok(())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let call = self.writes;
        self.writes += 1;
        if !self.connected || self.fail_write_at == Some(call) {
            return Err(ErrorKind::BrokenPipe);
        }
        if self.short_write_at == Some(call) {
            return Ok(buf.len() / 2);
        }
        self.lines.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    async fn close(&mut self) {
        self.closes += 1;
        self.connected = false;
    }
}

/// Publisher that records messages and can fail a chosen publish
pub struct MockPublisher {
    pub connected: bool,
    /// Publish call (0-based) that fails
    pub fail_at: Option<usize>,
    pub calls: usize,
    pub messages: Vec<(String, String)>,
}

impl MockPublisher {
    pub fn online() -> Self {
        Self {
            connected: true,
            fail_at: None,
            calls: 0,
            messages: Vec::new(),
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            ..Self::online()
        }
    }

    pub fn payloads(&self) -> Vec<&str> {
        self.messages.iter().map(|(_, payload)| payload.as_str()).collect()
    }
}

impl Publisher for MockPublisher {
    type Error = ();

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Self::Error> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(());
        }
        self.messages.push((
            String::from(channel),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }
}

/// Delay that returns immediately and remembers what was asked for
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls_ms: Vec<u32>,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
        self.calls_ms.push(ms);
    }
}

/// Accelerometer double replaying a fixed reading
#[derive(Default)]
pub struct MockSensor {
    pub reading: Axes,
    pub data_ready: bool,
    pub fail_reads: bool,
    pub armed: bool,
    pub low_power: Option<WakeOnMotion>,
    pub reads: usize,
    pub latch_clears: usize,
    pub configures: usize,
}

impl SensorDriver for MockSensor {
    type Error = ();

    fn configure_active(&mut self) -> Result<(), Self::Error> {
        self.configures += 1;
        self.low_power = None;
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Axes, Self::Error> {
        if self.fail_reads {
            return Err(());
        }
        self.reads += 1;
        self.data_ready = false;
        Ok(self.reading)
    }

    fn data_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.data_ready)
    }

    fn arm_interrupt(&mut self) -> Result<(), Self::Error> {
        self.armed = true;
        Ok(())
    }

    fn disarm_interrupt(&mut self) -> Result<(), Self::Error> {
        self.armed = false;
        Ok(())
    }

    fn clear_interrupt(&mut self) -> Result<(), Self::Error> {
        self.latch_clears += 1;
        Ok(())
    }

    fn enter_low_power(&mut self, wake: WakeOnMotion) -> Result<(), Self::Error> {
        self.low_power = Some(wake);
        Ok(())
    }
}

/// Settable wall clock
#[derive(Default)]
pub struct MockClock {
    pub now: Cell<Option<u64>>,
}

impl MockClock {
    pub fn at(unix_secs: u64) -> Self {
        Self {
            now: Cell::new(Some(unix_secs)),
        }
    }

    pub fn unsynced() -> Self {
        Self::default()
    }
}

impl Clock for MockClock {
    fn unix_time(&self) -> Option<u64> {
        self.now.get()
    }
}

/// RAM-backed durable store
pub struct MemoryStore {
    pub bytes: Vec<u8>,
    pub fail: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: std::vec![0; size],
            fail: false,
            writes: 0,
        }
    }
}

impl DurableStore for MemoryStore {
    type Error = ();

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }
        let end = offset.checked_add(buf.len()).ok_or(())?;
        buf.copy_from_slice(self.bytes.get(offset..end).ok_or(())?);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }
        let end = offset.checked_add(data.len()).ok_or(())?;
        self.bytes.get_mut(offset..end).ok_or(())?.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
