#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod bkpsram;
mod device_id;
mod eth;
mod lis331;
mod network;
mod power;
mod time;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// Network work requested by the lifecycle task
#[derive(Clone, Copy, defmt::Format)]
pub enum UplinkRequest {
    /// Pre-sleep flush of up to `max_entries` samples
    Flush { max_entries: usize },
    /// Activity digest pass over up to `max_entries` minutes
    PublishDigest { max_entries: usize },
}

/// Milliseconds since boot, the time base of the tracker's soft timers
fn now_ms() -> u64 {
    Mono::now().duration_since_epoch().to_millis()
}

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use core::cell::RefCell;
    use cortex_m::peripheral::SCB;
    use defmt::{error, info, warn, Debug2Format};
    use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice as SpiDeviceBus;
    use embassy_futures::join::join3;
    use embassy_futures::select::{select, Either};
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::rtc::{Rtc, RtcConfig};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::wdg::IndependentWatchdog;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
    use embassy_sync::signal::Signal;
    use motion_core::config::{DigestConfig, DIGEST_SLOTS, RING_CAPACITY};
    use motion_core::{
        ActivityDigest, Directive, Error, Event, MotionSample, Orchestrator, SampleRing,
        SampleUploader, TrackerConfig,
    };
    use rtic::mutex_prelude::*;
    use rtic_sync::channel::{Receiver, Sender};
    use rtic_sync::make_channel;
    use static_cell::StaticCell;

    use crate::bkpsram::BackupSram;
    use crate::lis331::Lis331;
    use crate::network::{
        manager, CollectorConfig, CollectorUplink, MqttConfig, MqttPublisher, NetworkConfig,
        SntpClient, SntpConfig,
    };

    type SensorSpi =
        SpiDeviceBus<'static, CriticalSectionRawMutex, Spi<'static, Blocking>, Output<'static>>;
    type Tracker = Orchestrator<'static, Lis331<SensorSpi>, time::RtcClock>;

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    const REQUEST_CAPACITY: usize = 4;

    /// IWDG timeout; the heartbeat pets it every `HEARTBEAT_SECS`
    const WATCHDOG_TIMEOUT_US: u32 = 30_000_000;
    const HEARTBEAT_SECS: u32 = 5;

    /// RTC wake period in standby, where nothing pets the IWDG
    const STANDBY_WAKE_SECS: u32 = 20;
    const _: () = assert!(
        (STANDBY_WAKE_SECS + HEARTBEAT_SECS) as u64 * 1_000_000 < WATCHDOG_TIMEOUT_US as u64
    );

    /// Records sent by the network task for a flush request
    static FLUSHED: Signal<CriticalSectionRawMutex, usize> = Signal::new();

    /// Timer deadlines changed outside the lifecycle task
    static RESCHEDULE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

    #[shared]
    struct Shared {
        tracker: Tracker,
        store: BackupSram,
        led: Output<'static>,
    }

    #[local]
    struct Local {
        motion_pin: ExtiInput<'static>,
        watchdog: IndependentWatchdog<'static, peripherals::IWDG>,
        scb: SCB,
        requests: Sender<'static, UplinkRequest, REQUEST_CAPACITY>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        info!("Motion tracker starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);

        if power::woke_from_standby() {
            info!("Woke from standby");
        }

        let rtc = Rtc::new(p.RTC, RtcConfig::default());
        time::initialize_rtc(rtc);
        info!("Wall clock trusted: {}", time::is_time_synced());

        let mut watchdog = IndependentWatchdog::new(p.IWDG, WATCHDOG_TIMEOUT_US);
        watchdog.unleash();

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        let tracker_config = TrackerConfig {
            wake_after_secs: STANDBY_WAKE_SECS,
            ..TrackerConfig::default()
        };
        let flush_wait_ms = flush_ack_bound_ms(&tracker_config.digest);

        static RING_STORAGE: StaticCell<[MotionSample; RING_CAPACITY]> = StaticCell::new();
        static RING: StaticCell<SampleRing<'static>> = StaticCell::new();
        let storage = RING_STORAGE.init_with(|| [MotionSample::EMPTY; RING_CAPACITY]);
        let ring: &'static SampleRing<'static> = match SampleRing::new(storage) {
            Ok(ring) => RING.init(ring),
            Err(e) => defmt::panic!("sample ring: {}", e),
        };

        let Some(mut store) = BackupSram::take() else {
            defmt::panic!("backup SRAM already taken");
        };

        static COUNTERS: StaticCell<[u16; DIGEST_SLOTS]> = StaticCell::new();
        static DIGEST: StaticCell<ActivityDigest<'static>> = StaticCell::new();
        let counters = COUNTERS.init([0; DIGEST_SLOTS]);
        let digest: &'static ActivityDigest<'static> =
            match ActivityDigest::new(counters, &tracker_config.digest) {
                Ok(digest) => DIGEST.init(digest),
                Err(e) => defmt::panic!("activity digest: {}", e),
            };
        match digest.restore(&mut store) {
            Ok(true) => digest.log_summary(),
            Ok(false) => {}
            Err(e) => warn!("Digest not restored: {}", e),
        }

        // LIS331 on SPI1 (PA5/PA7/PA6), CS on PC4, mode 3
        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(5_000_000);
        spi_config.mode = spi::MODE_3;
        let sensor_spi = Spi::new_blocking(p.SPI1, p.PA5, p.PA7, p.PA6, spi_config);
        static SENSOR_BUS: StaticCell<
            BlockingMutex<CriticalSectionRawMutex, RefCell<Spi<'static, Blocking>>>,
        > = StaticCell::new();
        let sensor_bus = SENSOR_BUS.init(BlockingMutex::new(RefCell::new(sensor_spi)));
        let sensor_cs = Output::new(p.PC4, Level::High, Speed::VeryHigh);
        let mut sensor = Lis331::new(SpiDeviceBus::new(sensor_bus, sensor_cs));
        match sensor.probe() {
            Ok(true) => info!("LIS331 detected"),
            Ok(false) => {}
            Err(e) => error!("LIS331 not responding: {}", Debug2Format(&e)),
        }

        // INT1 on PA0, also the standby WKUP pin
        let motion_pin = ExtiInput::new(p.PA0, p.EXTI0, Pull::Down);

        let upload_batch = tracker_config.upload_batch;
        let mut tracker = Orchestrator::new(ring, digest, sensor, time::RtcClock, tracker_config);
        if let Err(e) = tracker.start(now_ms()) {
            error!("Tracker start failed: {}", e);
        }

        let (requests, request_rx) = make_channel!(UplinkRequest, REQUEST_CAPACITY);

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        heartbeat::spawn().ok();
        motion::spawn().ok();
        lifecycle::spawn(flush_wait_ms).ok();
        network_task::spawn(net_periph, ring, digest, request_rx, upload_batch).ok();

        (
            Shared {
                tracker,
                store,
                led,
            },
            Local {
                motion_pin,
                watchdog,
                scb: cx.core.SCB,
                requests,
            },
        )
    }

    /// Heartbeat task, also the only place the watchdog is fed
    #[task(priority = 1, local = [watchdog], shared = [led])]
    async fn heartbeat(mut cx: heartbeat::Context) {
        info!("Heartbeat task started");
        loop {
            cx.local.watchdog.pet();
            cx.shared.led.lock(|led| led.set_high());
            Mono::delay(100.millis()).await;
            cx.shared.led.lock(|led| led.set_low());
            Mono::delay((u64::from(HEARTBEAT_SECS) * 1000 - 100).millis()).await;
        }
    }

    /// Short LED flash per motion interrupt
    #[task(priority = 1, shared = [led])]
    async fn blink(mut cx: blink::Context) {
        cx.shared.led.lock(|led| led.set_high());
        Mono::delay(10.millis()).await;
        cx.shared.led.lock(|led| led.set_low());
    }

    /// LIS331 INT1
    ///
    /// INT1 is latched, so the pin stays high until the tracker reads
    /// INT1_SRC. Waiting for a level instead of an edge cannot miss an
    /// event latched while the previous one was handled.
    #[task(priority = 3, local = [motion_pin], shared = [tracker])]
    async fn motion(mut cx: motion::Context) {
        loop {
            cx.local.motion_pin.wait_for_high().await;
            let result = cx
                .shared
                .tracker
                .lock(|tracker| tracker.handle(Event::MotionInterrupt, now_ms()));
            match result {
                Ok(_) => {
                    blink::spawn().ok();
                }
                Err(e) => {
                    warn!("Motion interrupt not handled: {}", e);
                    // The latch is still set; back off instead of spinning
                    Mono::delay(10.millis()).await;
                }
            }
            RESCHEDULE.signal(());
        }
    }

    /// Worst case between queueing a flush and its acknowledgement
    ///
    /// At most one digest pass is queued ahead of a flush, behind whatever
    /// the network task is already doing.
    fn flush_ack_bound_ms(digest: &DigestConfig) -> u64 {
        let collector = CollectorConfig::default().pass_bound_ms();
        let sntp = SntpConfig::default().sync_budget_ms;
        let digest = digest.pass_bound_ms(DIGEST_SLOTS, MqttConfig::default().timeout_ms);
        collector.max(digest).max(sntp) + digest + collector
    }

    /// Soft timers, the pre-sleep flush and standby entry
    #[task(priority = 2, local = [scb, requests], shared = [tracker, store])]
    async fn lifecycle(mut cx: lifecycle::Context, flush_wait_ms: u64) {
        loop {
            let now = now_ms();
            let Some(event) = cx.shared.tracker.lock(|tracker| tracker.poll_timers(now)) else {
                let deadline = cx.shared.tracker.lock(|tracker| tracker.next_deadline());
                wait_for_work(deadline).await;
                continue;
            };

            match cx.shared.tracker.lock(|tracker| tracker.handle(event, now)) {
                Ok(Directive::None) => {}
                Ok(Directive::PublishDigest { max_entries }) => {
                    let request = UplinkRequest::PublishDigest { max_entries };
                    if !cx.local.requests.is_empty() || cx.local.requests.try_send(request).is_err() {
                        warn!("Uplink busy, digest pass skipped");
                    }
                }
                Ok(Directive::Flush { max_entries }) => {
                    FLUSHED.reset();
                    let request = UplinkRequest::Flush { max_entries };
                    if max_entries > 0 && cx.local.requests.try_send(request).is_ok() {
                        // Every network step is bounded, so this only fires
                        // if the network task itself is stuck
                        let timeout = Mono::delay(flush_wait_ms.millis());
                        match select(FLUSHED.wait(), timeout).await {
                            Either::First(sent) => info!("Flushed {} of {} samples", sent, max_entries),
                            Either::Second(_) => warn!("No flush acknowledgement, sleeping anyway"),
                        }
                    }

                    let sleep = (&mut cx.shared.tracker, &mut cx.shared.store)
                        .lock(|tracker, store| tracker.enter_deep_sleep(store));
                    match sleep {
                        Ok(request) => power::enter_standby(cx.local.scb, request.wake_after_secs),
                        Err(e) => {
                            error!("Cannot park sensor for standby: {}, resetting", e);
                            SCB::sys_reset();
                        }
                    }
                }
                Err(e) => warn!("{} not handled: {}", event, e),
            }
        }
    }

    /// Sleep until `deadline` or until the motion task moved the timers
    async fn wait_for_work(deadline: Option<u64>) {
        match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_sub(now_ms());
                select(Mono::delay(wait.millis()), RESCHEDULE.wait()).await;
            }
            None => RESCHEDULE.wait().await,
        }
    }

    /// Log an upload failure; an overrun means the ring is corrupt
    fn check_upload(result: Result<usize, Error>) -> usize {
        match result {
            Ok(sent) => sent,
            Err(e) if e.is_fatal() => {
                error!("Upload failed fatally: {}, resetting", e);
                SCB::sys_reset();
            }
            Err(e) => {
                warn!("Upload pass failed: {}", e);
                0
            }
        }
    }

    /// Network task - owns the stack and every client on it
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1, shared = [store])]
    async fn network_task(
        mut cx: network_task::Context,
        periph: NetworkPeripherals,
        ring: &'static SampleRing<'static>,
        digest: &'static ActivityDigest<'static>,
        mut requests: Receiver<'static, UplinkRequest, REQUEST_CAPACITY>,
        upload_batch: usize,
    ) {
        use embassy_net::{Config, StackResources};

        info!("Network task started");

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let cs = Output::new(periph.cs, Level::High, Speed::VeryHigh);
        let reset = Output::new(periph.reset, Level::High, Speed::Low);
        let int = ExtiInput::new(periph.int, periph.exti, Pull::Up);

        let eth_periph = eth::EthPeripherals {
            spi,
            cs,
            reset,
            int,
        };

        let network = NetworkConfig::from_uid(device_id::uid());
        let (device, w5500_runner) = match eth::init_w5500(eth_periph, network.mac_addr).await {
            Ok(parts) => parts,
            Err(e) => {
                // Samples keep recording; they are lost at the next standby
                error!("Ethernet unavailable: {}", e);
                return;
            }
        };

        static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            network.seed,
        );
        info!("Network stack initialized with DHCP");

        let app_logic = async {
            // The lifecycle may want to sleep before DHCP ever completes
            loop {
                match select(manager::wait_for_config(&stack), requests.recv()).await {
                    Either::First(_) => break,
                    Either::Second(Ok(UplinkRequest::Flush { .. })) => {
                        warn!("No network yet, nothing flushed");
                        FLUSHED.signal(0);
                    }
                    Either::Second(Ok(UplinkRequest::PublishDigest { .. })) => {
                        warn!("No network yet, digest pass skipped");
                    }
                    Either::Second(Err(_)) => {
                        error!("Uplink request channel closed");
                        manager::wait_for_config(&stack).await;
                        break;
                    }
                }
            }

            let sntp = SntpClient::with_config(SntpConfig::default());
            if let Err(e) = sntp.sync(&stack).await {
                warn!("SNTP initialization failed: {:?}", e);
            }
            let mut last_sync = Mono::now();

            let collector = CollectorConfig::default();
            let service_interval = collector.service_interval_ms;
            let mut rx_buffer = [0u8; 256];
            let mut tx_buffer = [0u8; 2048];
            let mut uplink = CollectorUplink::new(stack, &mut rx_buffer, &mut tx_buffer, collector);
            let mut uploader = SampleUploader::new(ring, upload_batch);
            let mut publisher = MqttPublisher::new(stack, MqttConfig::default());
            let mut delay = embassy_time::Delay;

            loop {
                match select(requests.recv(), Mono::delay(service_interval.millis())).await {
                    Either::First(Ok(UplinkRequest::Flush { max_entries })) => {
                        let sent = check_upload(uploader.flush(max_entries, &mut uplink).await);
                        FLUSHED.signal(sent);
                    }
                    Either::First(Ok(UplinkRequest::PublishDigest { max_entries })) => {
                        let before = digest.last_uploaded();
                        if !digest.publish_backlog(max_entries, &mut publisher, &mut delay).await {
                            warn!("Digest backlog not fully published");
                        }
                        if digest.last_uploaded() != before {
                            if let Err(e) = cx.shared.store.lock(|store| digest.persist(store)) {
                                warn!("Digest not persisted: {}", e);
                            }
                        }
                    }
                    Either::First(Err(_)) => {
                        error!("Uplink request channel closed");
                        Mono::delay(service_interval.millis()).await;
                    }
                    Either::Second(_) => {
                        check_upload(uploader.service(&mut uplink).await);
                    }
                }

                // Pending requests go first; a flush may be waiting
                if requests.is_empty()
                    && (Mono::now() - last_sync).to_secs() >= sntp.resync_period_secs()
                {
                    info!("SNTP resync triggered");
                    if let Err(e) = sntp.sync(&stack).await {
                        warn!("SNTP sync failed: {:?}", e);
                    }
                    last_sync = Mono::now();
                }
            }
        };

        join3(w5500_runner.run(), net_runner.run(), app_logic).await;
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
