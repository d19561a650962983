//! Haptic glove firmware for nRF52840 + BlueNRG-2.
//!
//! A BLE peripheral that receives a 2×2 intensity grid from the
//! controller app and drives four vibration actuators with PWM.
//!
//! Task layout:
//!
//! ```text
//!   ┌─────────────┐  HCI events  ┌─────────────┐
//!   │ radio_task  │ ───────────▶ │ glove_task  │──▶ PWM0/1/2
//!   │ (BlueNRG-2) │ ◀─────────── │ (Glove)     │
//!   └─────────────┘   Requests   └─────────────┘
//!          │                            │
//!          └──────── indicator ◀────────┘  fault / status LEDs
//! ```

#![no_std]
#![no_main]

mod ble;
mod indicator;
mod pwm;

use defmt::{debug, error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::peripherals::SPI3;
use embassy_nrf::pwm::SimplePwm;
use embassy_nrf::spim::{self, Spim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use haptic_glove::config::{
    ACTUATION_SETTLE_MS, EVENT_QUEUE_DEPTH, INDICATOR_QUEUE_DEPTH, REQUEST_QUEUE_DEPTH,
    TICK_INTERVAL_MS,
};
use haptic_glove::codec::GRID_SLOTS;
use haptic_glove::hci::HciPacket;
use haptic_glove::startup;
use haptic_glove::transport::Request;
use haptic_glove::{Error, Glove, Reaction};

use ble::bluenrg::BlueNrg;
use ble::{IndicatorSender, RequestSender};
use indicator::IndicatorCommand;
use pwm::GlovePwm;

bind_interrupts!(struct Irqs {
    SPIM3 => spim::InterruptHandler<peripherals::SPI3>;
});

// ═══════════════════════════════════════════════════════════════════════════
// Inter-task channels
// ═══════════════════════════════════════════════════════════════════════════

static EVENTS: Channel<CriticalSectionRawMutex, HciPacket, EVENT_QUEUE_DEPTH> = Channel::new();
static REQUESTS: Channel<CriticalSectionRawMutex, Request, REQUEST_QUEUE_DEPTH> = Channel::new();
static INDICATOR: Channel<CriticalSectionRawMutex, IndicatorCommand, INDICATOR_QUEUE_DEPTH> =
    Channel::new();

type Radio = BlueNrg<Spim<'static, SPI3>, Output<'static>, Input<'static>, Output<'static>, Delay>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("haptic-glove starting");
    let p = embassy_nrf::init(Default::default());

    let mut fault = Output::new(p.P0_13, indicator::dark(), OutputDrive::Standard);
    let status = Output::new(p.P0_14, indicator::dark(), OutputDrive::Standard);

    // Actuators come up at duty 0.
    let actuators = GlovePwm::new(
        SimplePwm::new_2ch(p.PWM0, p.P0_02, p.P0_03),
        SimplePwm::new_1ch(p.PWM1, p.P0_28),
        SimplePwm::new_1ch(p.PWM2, p.P0_29),
    );

    let mut spi_config = spim::Config::default();
    spi_config.frequency = spim::Frequency::M1;
    spi_config.mode = spim::MODE_1;
    let spi = Spim::new(p.SPI3, Irqs, p.P0_19, p.P0_21, p.P0_20, spi_config);

    let mut radio: Radio = BlueNrg::new(
        spi,
        Output::new(p.P0_22, Level::High, OutputDrive::Standard),
        Input::new(p.P0_23, Pull::Down),
        Output::new(p.P0_24, Level::High, OutputDrive::Standard),
        Delay,
    );

    // Blocking: no other task is running yet.
    let up = match startup::bring_up(&mut radio) {
        Ok(up) => up,
        Err(e) => {
            error!("Bring-up failed: {}", e);
            fault.set_level(indicator::lit());
            halt();
        }
    };

    info!("BLE address: {}", up.address);
    match up.version {
        Some(v) => info!("BlueNRG-2 hw {=u8:#x} fw {=u16:#x}", v.hardware, v.firmware),
        None => warn!("BlueNRG-2 version unavailable"),
    }
    if !up.warnings.is_empty() {
        warn!("Bring-up warnings: {}", up.warnings);
    }
    info!("Grid service {=u16:#x}, characteristic {=u16:#x}", up.handles.service, up.handles.grid);

    let mut glove = Glove::new(actuators, up.address, up.handles);
    let report = glove.all_off();
    if !report.is_complete() {
        warn!("Actuator reset incomplete: {}", report);
    }

    unwrap!(spawner.spawn(indicator_leds(fault, status)));
    unwrap!(spawner.spawn(radio_task(radio)));
    unwrap!(spawner.spawn(glove_task(glove)));
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn indicator_leds(fault: Output<'static>, status: Output<'static>) {
    indicator::indicator_task(fault, status, INDICATOR.receiver()).await
}

#[embassy_executor::task]
async fn radio_task(radio: Radio) {
    ble::radio_task(radio, EVENTS.sender(), REQUESTS.receiver(), INDICATOR.sender()).await
}

#[embassy_executor::task]
async fn glove_task(mut glove: Glove<GlovePwm<'static>>) {
    let events = EVENTS.receiver();
    let requests = REQUESTS.sender();
    let indicator = INDICATOR.sender();

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut state = glove.session().state();

    loop {
        let reaction = match select(events.receive(), ticker.next()).await {
            Either::First(packet) => glove.on_packet(&packet),
            Either::Second(()) => glove.tick(Instant::now().as_millis()),
        };

        react(reaction, &requests, &indicator).await;

        let now = glove.session().state();
        if now != state {
            info!("Session: {} -> {}", state, now);
            state = now;
            let _ = indicator.try_send(IndicatorCommand::Session(now));
        }
    }
}

async fn react(reaction: Reaction, requests: &RequestSender, indicator: &IndicatorSender) {
    match reaction {
        Reaction::Ignored | Reaction::Handled => {}
        Reaction::Request(request) => {
            if requests.try_send(request).is_err() {
                fault(Error::RequestQueueFull, indicator);
            }
        }
        Reaction::Actuated(report) => {
            debug!("Actuators: {}", report.duties);
            if !report.is_complete() {
                for slot in (0..GRID_SLOTS).filter(|&slot| report.slot_failed(slot)) {
                    warn!("Actuator slot {} failed", slot);
                }
                fault(Error::Actuator, indicator);
            }
            Timer::after(Duration::from_millis(ACTUATION_SETTLE_MS)).await;
        }
        Reaction::ConnectionFailed(status) => {
            warn!("Connection failed, status {=u8:#x}", status);
        }
        Reaction::Dropped(e) => warn!("Dropped: {}", e),
        Reaction::Fault(e) => fault(e, indicator),
    }
}

fn fault(e: Error, indicator: &IndicatorSender) {
    warn!("Fault: {}", e);
    let _ = indicator.try_send(IndicatorCommand::Fault);
}
