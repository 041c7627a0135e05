//! Motion lifecycle state machine
//!
//! ```text
//!            interrupt              window expired
//! Monitoring ─────────► Streaming ────────────────► Monitoring
//!     │                     │
//!     └──── no activity ────┴──► Suspending ──► DeepSleep ──wake──► Monitoring
//! ```
//!
//! Hardware interrupts and timer expiries arrive as [`Event`]s. The
//! orchestrator never performs network I/O itself: events that need it
//! return a [`Directive`] and the caller runs the upload outside whatever
//! lock guards the orchestrator, so the motion interrupt keeps recording
//! samples while a flush is in flight.
//!
//! Time is a monotonic millisecond count supplied by the caller. Timers
//! are polled with [`Orchestrator::poll_timers`]; the caller sleeps until
//! [`Orchestrator::next_deadline`] or the next interrupt, whichever is
//! first.

use hal_abstractions::{Clock, DurableStore, SensorDriver, Transport};

use crate::calendar::minute_of_day;
use crate::config::TrackerConfig;
use crate::digest::ActivityDigest;
use crate::error::Error;
use crate::ring::SampleRing;
use crate::sample::{MotionSample, Origin};
use crate::timer::Timer;
use crate::tunables::{parse_period, Tunable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleState {
    /// Motion interrupt armed, waiting
    Monitoring,
    /// High-rate sampling window open
    Streaming,
    /// Flushing before deep sleep
    Suspending,
    /// Sensor parked in wake-on-motion, MCU about to halt
    DeepSleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    MotionInterrupt,
    SampleTick,
    WindowExpired,
    NoActivityExpired,
    DigestPublishDue,
    Wake,
}

/// Follow-up work the caller must perform after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Directive {
    None,
    /// Drain up to `max_entries` samples, then call
    /// [`Orchestrator::enter_deep_sleep`]
    Flush { max_entries: usize },
    /// Publish up to `max_entries` minutes of digest backlog
    PublishDigest { max_entries: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    NoActivity,
    StreamingWindow,
    SampleInterval,
    DigestPublish,
}

impl TimerKind {
    /// Polling order; earlier kinds win ties on equal deadlines
    pub const ALL: [TimerKind; 4] = [
        TimerKind::NoActivity,
        TimerKind::StreamingWindow,
        TimerKind::SampleInterval,
        TimerKind::DigestPublish,
    ];

    pub const fn event(self) -> Event {
        match self {
            TimerKind::NoActivity => Event::NoActivityExpired,
            TimerKind::StreamingWindow => Event::WindowExpired,
            TimerKind::SampleInterval => Event::SampleTick,
            TimerKind::DigestPublish => Event::DigestPublishDue,
        }
    }
}

/// Returned once the device is ready to halt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepRequest {
    /// Periodic wake-up in addition to wake-on-motion
    pub wake_after_secs: u32,
}

pub struct Orchestrator<'a, S, C> {
    ring: &'a SampleRing<'a>,
    digest: &'a ActivityDigest<'a>,
    sensor: S,
    clock: C,
    config: TrackerConfig,
    state: LifecycleState,
    no_activity: Timer,
    window: Timer,
    sample: Timer,
    digest_publish: Timer,
    dropped: u32,
}

impl<'a, S, C> Orchestrator<'a, S, C>
where
    S: SensorDriver,
    C: Clock,
{
    pub fn new(
        ring: &'a SampleRing<'a>,
        digest: &'a ActivityDigest<'a>,
        sensor: S,
        clock: C,
        config: TrackerConfig,
    ) -> Self {
        Self {
            ring,
            digest,
            sensor,
            clock,
            state: LifecycleState::Monitoring,
            no_activity: Timer::one_shot(config.sleep_timeout_ms),
            window: Timer::one_shot(config.streaming_window_ms),
            sample: Timer::periodic(config.sample_interval_ms),
            digest_publish: Timer::periodic(config.digest_publish_interval_ms),
            config,
            dropped: 0,
        }
    }

    /// Bring the sensor up and start monitoring
    pub fn start(&mut self, now: u64) -> Result<(), Error> {
        self.sensor.configure_active().map_err(|_| Error::Sensor)?;
        self.sensor.clear_interrupt().map_err(|_| Error::Sensor)?;
        self.sensor.arm_interrupt().map_err(|_| Error::Sensor)?;

        self.window.stop();
        self.sample.stop();
        self.no_activity.start(now);
        self.digest_publish.start(now);
        self.state = LifecycleState::Monitoring;

        info!(
            "monitoring: sleep after {} ms idle, {} ms streaming window",
            self.no_activity.period(),
            self.window.period()
        );
        Ok(())
    }

    /// Apply one event
    ///
    /// # Errors
    ///
    /// [`Error::Sensor`] when a sensor transaction fails. The state is
    /// left as it was before the failing step.
    pub fn handle(&mut self, event: Event, now: u64) -> Result<Directive, Error> {
        use LifecycleState::*;

        trace!("{} in {}", event, self.state);
        match (self.state, event) {
            (DeepSleep, Event::Wake) => {
                info!("woke from deep sleep");
                self.start(now)?;
            }
            (DeepSleep, Event::MotionInterrupt) => {
                // Wake-on-motion latches INT1; release it so the line can
                // rise again and is not reported as pending forever
                self.sensor.clear_interrupt().map_err(|_| Error::Sensor)?;
                debug!("motion in deep sleep, latch released");
            }
            (DeepSleep, _) | (_, Event::Wake) => {
                debug!("{} ignored in {}", event, self.state);
            }
            (_, Event::MotionInterrupt) => self.on_motion(now)?,
            (Streaming, Event::SampleTick) => self.on_sample_tick()?,
            (_, Event::SampleTick) => {}
            (_, Event::WindowExpired) => {
                self.window.stop();
                self.sample.stop();
                if self.state == Streaming {
                    debug!("streaming window closed");
                    self.state = Monitoring;
                }
            }
            (Suspending, _) => {}
            (_, Event::NoActivityExpired) => {
                return Ok(Directive::Flush {
                    max_entries: self.begin_suspend(),
                });
            }
            (_, Event::DigestPublishDue) => {
                return Ok(Directive::PublishDigest {
                    max_entries: self.config.backlog_minutes_per_pass,
                });
            }
        }
        Ok(Directive::None)
    }

    fn on_motion(&mut self, now: u64) -> Result<(), Error> {
        self.sensor.clear_interrupt().map_err(|_| Error::Sensor)?;
        let axes = self.sensor.read_sample().map_err(|_| Error::Sensor)?;

        let unix = self.clock.unix_time();
        self.record(MotionSample::new(unix.unwrap_or(0), Origin::Interrupt, axes));
        match unix {
            Some(unix) => self.digest.record_activity(minute_of_day(unix)),
            None => debug!("clock not synchronized, activity not digested"),
        }

        if self.state == LifecycleState::Suspending {
            return Ok(());
        }

        self.no_activity.reset(now);
        self.window.reset(now);
        self.sample.start(now);
        if self.state != LifecycleState::Streaming {
            debug!("streaming for {} ms", self.window.period());
            self.state = LifecycleState::Streaming;
        }
        Ok(())
    }

    fn on_sample_tick(&mut self) -> Result<(), Error> {
        if !self.sensor.data_ready().map_err(|_| Error::Sensor)? {
            return Ok(());
        }
        let axes = self.sensor.read_sample().map_err(|_| Error::Sensor)?;
        let timestamp = self.clock.unix_time().unwrap_or(0);
        self.record(MotionSample::new(timestamp, Origin::Stream, axes));
        Ok(())
    }

    fn record(&mut self, sample: MotionSample) {
        if !self.ring.push(sample) {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }

    /// Stop the lifecycle timers and size the pre-sleep flush
    fn begin_suspend(&mut self) -> usize {
        self.stop_timers();
        self.state = LifecycleState::Suspending;

        let max_entries = self.ring.pending_entries().min(self.config.flush_limit);
        info!("no activity, flushing {} samples before sleep", max_entries);
        max_entries
    }

    fn stop_timers(&mut self) {
        self.no_activity.stop();
        self.window.stop();
        self.sample.stop();
        self.digest_publish.stop();
    }

    /// Park the sensor and persist the digest once the flush has returned
    ///
    /// A persist failure is logged and does not prevent sleep.
    ///
    /// # Errors
    ///
    /// [`Error::Sensor`] if the interrupt cannot be detached or the sensor
    /// refuses wake-on-motion mode. The orchestrator stays in
    /// [`LifecycleState::Suspending`].
    pub fn enter_deep_sleep<D: DurableStore>(
        &mut self,
        store: &mut D,
    ) -> Result<SleepRequest, Error> {
        self.stop_timers();
        self.sensor.disarm_interrupt().map_err(|_| Error::Sensor)?;
        self.sensor
            .enter_low_power(self.config.wake_on_motion)
            .map_err(|_| Error::Sensor)?;

        if let Err(e) = self.digest.persist(store) {
            error!("digest not persisted before sleep: {}", e);
        }

        self.state = LifecycleState::DeepSleep;
        info!(
            "entering deep sleep, {} samples left unsent, wake in {} s",
            self.ring.pending_entries(),
            self.config.wake_after_secs
        );
        Ok(SleepRequest {
            wake_after_secs: self.config.wake_after_secs,
        })
    }

    /// Run the whole suspend sequence when the caller owns every
    /// collaborator
    pub async fn suspend<T: Transport, D: DurableStore>(
        &mut self,
        transport: &mut T,
        store: &mut D,
    ) -> Result<SleepRequest, Error> {
        let max_entries = self.begin_suspend();
        let sent = self.ring.drain(max_entries, transport).await?;
        debug!("flushed {} of {} samples", sent, max_entries);
        self.enter_deep_sleep(store)
    }

    /// Change one of the runtime periods from a text payload
    ///
    /// Whether the affected timer is running is preserved. On a bad
    /// payload the previous period stays in force.
    pub fn apply_tunable(&mut self, tunable: Tunable, payload: &str, now: u64) -> Result<u32, Error> {
        let period = match parse_period(payload) {
            Ok(period) => period,
            Err(e) => {
                warn!("{} rejected: {}", tunable.command(), e);
                return Err(e);
            }
        };

        let timer = match tunable {
            Tunable::SleepTimeout => {
                self.config.sleep_timeout_ms = period;
                &mut self.no_activity
            }
            Tunable::StreamingWindow => {
                self.config.streaming_window_ms = period;
                &mut self.window
            }
            Tunable::SampleInterval => {
                self.config.sample_interval_ms = period;
                &mut self.sample
            }
        };
        timer.change_period(period, now);

        info!("{} set to {} ms", tunable.command(), period);
        Ok(period)
    }

    /// Consume the earliest expired timer, if any
    pub fn poll_timers(&mut self, now: u64) -> Option<Event> {
        let kind = TimerKind::ALL
            .into_iter()
            .filter(|kind| self.timer(*kind).is_expired(now))
            .min_by_key(|kind| self.timer(*kind).deadline())?;

        self.timer_mut(kind).take_expired(now);
        Some(kind.event())
    }

    /// Earliest deadline among running timers
    pub fn next_deadline(&self) -> Option<u64> {
        TimerKind::ALL
            .into_iter()
            .filter_map(|kind| self.timer(kind).deadline())
            .min()
    }

    fn timer(&self, kind: TimerKind) -> &Timer {
        match kind {
            TimerKind::NoActivity => &self.no_activity,
            TimerKind::StreamingWindow => &self.window,
            TimerKind::SampleInterval => &self.sample,
            TimerKind::DigestPublish => &self.digest_publish,
        }
    }

    fn timer_mut(&mut self, kind: TimerKind) -> &mut Timer {
        match kind {
            TimerKind::NoActivity => &mut self.no_activity,
            TimerKind::StreamingWindow => &mut self.window,
            TimerKind::SampleInterval => &mut self.sample,
            TimerKind::DigestPublish => &mut self.digest_publish,
        }
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.timer(kind).is_running()
    }

    pub fn period(&self, kind: TimerKind) -> u32 {
        self.timer(kind).period()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Samples lost to a full ring since boot
    pub fn dropped_samples(&self) -> u32 {
        self.dropped
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn ring(&self) -> &'a SampleRing<'a> {
        self.ring
    }

    pub fn digest(&self) -> &'a ActivityDigest<'a> {
        self.digest
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::config::{DigestConfig, DIGEST_SLOTS};
    use crate::sample::Axes;
    use crate::testing::{MemoryStore, MockClock, MockSensor, MockTransport};

    // 2017-02-12T10:20:30Z, minute 620
    const UNIX: u64 = 1486894830;
    const MINUTE: u16 = 620;

    fn sensor() -> MockSensor {
        MockSensor {
            reading: Axes::new(3, -4, 1000),
            ..MockSensor::default()
        }
    }

    macro_rules! fixture {
        ($orch:ident, $clock:expr) => {
            let mut storage = [MotionSample::EMPTY; 8];
            let ring = SampleRing::new(&mut storage).unwrap();
            let mut counters = [0u16; DIGEST_SLOTS];
            let digest = ActivityDigest::new(&mut counters, &DigestConfig::default()).unwrap();
            let clock = $clock;
            let mut $orch = Orchestrator::new(&ring, &digest, sensor(), &clock, TrackerConfig::default());
        };
    }

    #[test]
    fn test_start_arms_sensor() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();

        assert_eq!(orch.state(), LifecycleState::Monitoring);
        assert!(orch.sensor().armed);
        assert_eq!(orch.sensor().configures, 1);
        assert_eq!(orch.sensor().latch_clears, 1);
        assert!(orch.is_running(TimerKind::NoActivity));
        assert!(orch.is_running(TimerKind::DigestPublish));
        assert!(!orch.is_running(TimerKind::StreamingWindow));
        assert_eq!(orch.next_deadline(), Some(30_000));
    }

    #[test]
    fn test_interrupt_records_and_opens_window() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();

        assert_eq!(orch.handle(Event::MotionInterrupt, 500), Ok(Directive::None));
        assert_eq!(orch.state(), LifecycleState::Streaming);
        assert_eq!(orch.sensor().latch_clears, 2);
        assert_eq!(orch.ring().pending_entries(), 1);
        assert_eq!(orch.digest().count_at(MINUTE), Some(1));
        assert_eq!(orch.digest().active(), Some(MINUTE));
        assert_eq!(orch.timer(TimerKind::NoActivity).deadline(), Some(30_500));
        assert_eq!(orch.timer(TimerKind::StreamingWindow).deadline(), Some(1_500));
        assert_eq!(orch.timer(TimerKind::SampleInterval).deadline(), Some(510));

        // a second interrupt extends both deadlines
        orch.handle(Event::MotionInterrupt, 900).unwrap();
        assert_eq!(orch.timer(TimerKind::NoActivity).deadline(), Some(30_900));
        assert_eq!(orch.timer(TimerKind::StreamingWindow).deadline(), Some(1_900));
        assert_eq!(orch.digest().count_at(MINUTE), Some(2));
    }

    #[test]
    fn test_stream_ticks_until_window_closes() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.handle(Event::MotionInterrupt, 0).unwrap();

        let mut now = 0;
        let mut ticks = 0;
        while orch.state() == LifecycleState::Streaming {
            now = orch.next_deadline().unwrap();
            let event = orch.poll_timers(now).unwrap();
            if event == Event::SampleTick {
                ticks += 1;
                orch.sensor_mut().data_ready = ticks % 2 == 0;
            }
            orch.handle(event, now).unwrap();
        }

        assert_eq!(now, 1_000);
        assert_eq!(ticks, 99);
        assert!(!orch.is_running(TimerKind::SampleInterval));
        assert_eq!(orch.timer(TimerKind::NoActivity).deadline(), Some(30_000));
        // ring of 8 keeps the interrupt sample and six stream samples
        assert_eq!(orch.ring().pending_entries(), 7);
        assert!(orch.dropped_samples() > 0);
        assert_eq!(orch.digest().count_at(MINUTE), Some(1));
    }

    #[test]
    fn test_tick_outside_streaming_is_ignored() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.sensor_mut().data_ready = true;
        assert_eq!(orch.handle(Event::SampleTick, 10), Ok(Directive::None));
        assert!(orch.ring().is_empty());
    }

    #[test]
    fn test_unsynced_clock() {
        fixture!(orch, MockClock::unsynced());
        orch.start(0).unwrap();
        orch.handle(Event::MotionInterrupt, 0).unwrap();

        let mut transport = MockTransport::new();
        assert_eq!(block_on(orch.ring().drain(8, &mut transport)), Ok(1));
        assert!(transport.lines[0].starts_with("1970-01-01T00:00:00Z,i,3,-4,1000"));
        assert_eq!(orch.digest().active(), None);
    }

    #[test]
    fn test_suspend_and_wake() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.handle(Event::MotionInterrupt, 0).unwrap();
        orch.handle(Event::MotionInterrupt, 100).unwrap();
        orch.handle(Event::WindowExpired, 1_100).unwrap();
        assert_eq!(orch.state(), LifecycleState::Monitoring);

        assert_eq!(orch.poll_timers(30_100), Some(Event::NoActivityExpired));
        let directive = orch.handle(Event::NoActivityExpired, 30_100).unwrap();
        assert_eq!(directive, Directive::Flush { max_entries: 2 });
        assert_eq!(orch.state(), LifecycleState::Suspending);
        assert_eq!(orch.next_deadline(), None);

        // motion during the flush is kept but does not restart timers
        orch.handle(Event::MotionInterrupt, 30_200).unwrap();
        assert_eq!(orch.ring().pending_entries(), 3);
        assert_eq!(orch.digest().count_at(MINUTE), Some(3));
        assert_eq!(orch.state(), LifecycleState::Suspending);
        assert_eq!(orch.next_deadline(), None);

        let mut store = MemoryStore::new(4096);
        let request = orch.enter_deep_sleep(&mut store).unwrap();
        assert_eq!(request.wake_after_secs, 60);
        assert_eq!(orch.state(), LifecycleState::DeepSleep);
        assert!(!orch.sensor().armed);
        assert_eq!(orch.sensor().low_power, Some(orch.config().wake_on_motion));
        assert_eq!(&store.bytes[0..4], b"ACTD");

        assert_eq!(orch.handle(Event::MotionInterrupt, 40_000), Ok(Directive::None));
        assert_eq!(orch.ring().pending_entries(), 3);

        orch.handle(Event::Wake, 90_000).unwrap();
        assert_eq!(orch.state(), LifecycleState::Monitoring);
        assert!(orch.sensor().armed);
        assert_eq!(orch.sensor().low_power, None);
        assert_eq!(orch.next_deadline(), Some(120_000));
    }

    #[test]
    fn test_deep_sleep_releases_latch() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        let mut store = MemoryStore::new(4096);
        orch.enter_deep_sleep(&mut store).unwrap();
        let clears = orch.sensor().latch_clears;

        for now in [40_000, 40_001, 40_002] {
            assert_eq!(orch.handle(Event::MotionInterrupt, now), Ok(Directive::None));
        }
        assert_eq!(orch.sensor().latch_clears, clears + 3);
        assert_eq!(orch.state(), LifecycleState::DeepSleep);
        assert!(orch.ring().is_empty());
        assert_eq!(orch.sensor().reads, 0);
        assert_eq!(orch.next_deadline(), None);
        assert!(!orch.sensor().armed);
    }

    #[test]
    fn test_suspend_flushes_over_transport() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.handle(Event::MotionInterrupt, 0).unwrap();

        let mut transport = MockTransport::new();
        let mut store = MemoryStore::new(4096);
        let request = block_on(orch.suspend(&mut transport, &mut store)).unwrap();
        assert_eq!(request.wake_after_secs, 60);
        assert_eq!(transport.lines.len(), 1);
        assert!(orch.ring().is_empty());
        assert_eq!(orch.state(), LifecycleState::DeepSleep);
    }

    #[test]
    fn test_sleep_survives_store_failure() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        let mut store = MemoryStore::new(16);
        assert!(orch.enter_deep_sleep(&mut store).is_ok());
        assert_eq!(orch.state(), LifecycleState::DeepSleep);
    }

    #[test]
    fn test_digest_publish_is_periodic() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.apply_tunable(Tunable::SleepTimeout, "7200000", 0).unwrap();

        assert_eq!(orch.poll_timers(3_600_000), Some(Event::DigestPublishDue));
        assert_eq!(
            orch.handle(Event::DigestPublishDue, 3_600_000),
            Ok(Directive::PublishDigest { max_entries: 240 })
        );
        assert_eq!(orch.timer(TimerKind::DigestPublish).deadline(), Some(7_200_000));
    }

    #[test]
    fn test_tunables_keep_run_state() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();

        // window is stopped and stays stopped
        assert_eq!(orch.apply_tunable(Tunable::StreamingWindow, "2000", 10), Ok(2_000));
        assert!(!orch.is_running(TimerKind::StreamingWindow));
        assert_eq!(orch.period(TimerKind::StreamingWindow), 2_000);

        // no-activity is running and restarts with the new period
        assert_eq!(orch.apply_tunable(Tunable::SleepTimeout, "5000", 10), Ok(5_000));
        assert_eq!(orch.timer(TimerKind::NoActivity).deadline(), Some(5_010));

        assert_eq!(
            orch.apply_tunable(Tunable::SampleInterval, "fast", 10),
            Err(Error::InvalidTunable)
        );
        assert_eq!(orch.period(TimerKind::SampleInterval), 10);

        orch.handle(Event::MotionInterrupt, 100).unwrap();
        assert_eq!(orch.timer(TimerKind::StreamingWindow).deadline(), Some(2_100));
    }

    #[test]
    fn test_zero_tunables() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.handle(Event::MotionInterrupt, 0).unwrap();

        // sample timer keeps running, clamped to 1 ms
        assert_eq!(orch.apply_tunable(Tunable::SampleInterval, "0", 5), Ok(0));
        assert!(orch.is_running(TimerKind::SampleInterval));
        assert_eq!(orch.timer(TimerKind::SampleInterval).deadline(), Some(6));

        // window closes at the next poll
        assert_eq!(orch.apply_tunable(Tunable::StreamingWindow, "0", 5), Ok(0));
        assert!(orch.is_running(TimerKind::StreamingWindow));
        assert_eq!(orch.poll_timers(5), Some(Event::WindowExpired));
        orch.handle(Event::WindowExpired, 5).unwrap();
        assert_eq!(orch.state(), LifecycleState::Monitoring);
        assert!(!orch.is_running(TimerKind::SampleInterval));

        // a stopped timer stays stopped
        assert_eq!(orch.apply_tunable(Tunable::StreamingWindow, "0", 6), Ok(0));
        assert!(!orch.is_running(TimerKind::StreamingWindow));

        assert_eq!(orch.apply_tunable(Tunable::SleepTimeout, "0", 7), Ok(0));
        assert!(orch.is_running(TimerKind::NoActivity));
        assert_eq!(orch.poll_timers(7), Some(Event::NoActivityExpired));
        assert_eq!(
            orch.handle(Event::NoActivityExpired, 7),
            Ok(Directive::Flush { max_entries: 1 })
        );
    }

    #[test]
    fn test_sensor_failure_is_reported() {
        fixture!(orch, MockClock::at(UNIX));
        orch.start(0).unwrap();
        orch.sensor_mut().fail_reads = true;
        assert_eq!(orch.handle(Event::MotionInterrupt, 0), Err(Error::Sensor));
        assert_eq!(orch.state(), LifecycleState::Monitoring);
        assert!(orch.ring().is_empty());
    }
}
