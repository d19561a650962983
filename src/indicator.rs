//! Fault and status LEDs.
//!
//! - Fault LED: toggled on every recoverable fault. Steady on after a
//!   fatal bring-up error (set directly by `main`, before this task runs).
//! - Status LED: off while advertising, blinking while connected and
//!   waiting for pairing, steady on once paired.

use defmt::debug;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Ticker};

use haptic_glove::config::{INDICATOR_QUEUE_DEPTH, LED_ACTIVE_LOW};
use haptic_glove::SessionState;

const BLINK_MS: u64 = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum IndicatorCommand {
    /// A recoverable fault happened.
    Fault,
    /// The session moved to a new state.
    Session(SessionState),
}

/// Output level that lights an LED.
pub fn lit() -> Level {
    if LED_ACTIVE_LOW {
        Level::Low
    } else {
        Level::High
    }
}

/// Output level that darkens an LED.
pub fn dark() -> Level {
    if LED_ACTIVE_LOW {
        Level::High
    } else {
        Level::Low
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StatusPattern {
    Off,
    Blink,
    On,
}

impl From<SessionState> for StatusPattern {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle | SessionState::Advertising => StatusPattern::Off,
            SessionState::Connected | SessionState::PairingRequested => StatusPattern::Blink,
            SessionState::Paired => StatusPattern::On,
        }
    }
}

pub async fn indicator_task(
    mut fault: Output<'static>,
    mut status: Output<'static>,
    rx: Receiver<'static, CriticalSectionRawMutex, IndicatorCommand, INDICATOR_QUEUE_DEPTH>,
) -> ! {
    fault.set_level(dark());
    status.set_level(dark());

    let mut pattern = StatusPattern::Off;
    let mut blink = Ticker::every(Duration::from_millis(BLINK_MS));

    loop {
        match select(rx.receive(), blink.next()).await {
            Either::First(IndicatorCommand::Fault) => fault.toggle(),
            Either::First(IndicatorCommand::Session(state)) => {
                debug!("Indicator: {}", state);
                pattern = state.into();
                match pattern {
                    StatusPattern::Off => status.set_level(dark()),
                    StatusPattern::On => status.set_level(lit()),
                    StatusPattern::Blink => {}
                }
            }
            Either::Second(()) => {
                if pattern == StatusPattern::Blink {
                    status.toggle();
                }
            }
        }
    }
}
