//! Bluetooth Low Energy subsystem.
//!
//! The BLE stack runs on a BlueNRG-2 coprocessor reached over SPI:
//!
//! 1. **Driver** - HCI framing over the BlueNRG SPI protocol,
//!    command/completion exchange, event reads on IRQ. Blocking during
//!    bring-up, awaited afterwards.
//! 2. **Radio task** - sole owner of the driver. Forwards inbound event
//!    packets to the glove task in arrival order and executes the
//!    requests the glove task sends back.
//!
//! Communication with other tasks is done via Embassy channels defined
//! in `main.rs`.

pub mod bluenrg;

use defmt::{debug, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::Timer;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiBus;

use haptic_glove::config::{EVENT_QUEUE_DEPTH, INDICATOR_QUEUE_DEPTH, REQUEST_QUEUE_DEPTH};
use haptic_glove::hci::HciPacket;
use haptic_glove::transport::Request;

use crate::indicator::IndicatorCommand;
use bluenrg::BlueNrg;

pub type EventSender = Sender<'static, CriticalSectionRawMutex, HciPacket, EVENT_QUEUE_DEPTH>;
pub type RequestSender = Sender<'static, CriticalSectionRawMutex, Request, REQUEST_QUEUE_DEPTH>;
pub type RequestReceiver = Receiver<'static, CriticalSectionRawMutex, Request, REQUEST_QUEUE_DEPTH>;
pub type IndicatorSender =
    Sender<'static, CriticalSectionRawMutex, IndicatorCommand, INDICATOR_QUEUE_DEPTH>;

/// Back-off after a failed event read.
const READ_RETRY_MS: u64 = 10;

/// Back-off when IRQ was raised but nothing was pending.
const EMPTY_READ_MS: u64 = 1;

/// Run the radio loop: forward events, execute requests.
pub async fn radio_task<SPI, CS, IRQ, RST, D>(
    mut radio: BlueNrg<SPI, CS, IRQ, RST, D>,
    events: EventSender,
    requests: RequestReceiver,
    indicator: IndicatorSender,
) -> !
where
    SPI: SpiBus,
    CS: OutputPin,
    IRQ: InputPin + Wait,
    D: DelayNs,
{
    let mut dropped = 0;

    loop {
        // Only the IRQ wait is raced; reads and commands run to completion.
        match select(radio.event_ready(), requests.receive()).await {
            Either::First(Ok(())) => match radio.next_event().await {
                Ok(Some(packet)) => events.send(packet).await,
                Ok(None) => Timer::after_millis(EMPTY_READ_MS).await,
                Err(e) => {
                    warn!("Radio: event read failed: {}", e);
                    Timer::after_millis(READ_RETRY_MS).await;
                }
            },
            Either::First(Err(e)) => {
                warn!("Radio: IRQ wait failed: {}", e);
                Timer::after_millis(READ_RETRY_MS).await;
            }
            Either::Second(request) => {
                debug!("Radio: {}", request);
                if let Err(e) = request.execute_async(&mut radio).await {
                    warn!("Radio: {}", e);
                    let _ = indicator.try_send(IndicatorCommand::Fault);
                }
            }
        }

        if radio.dropped_events() != dropped {
            dropped = radio.dropped_events();
            warn!("Radio: {} events lost while waiting for completions", dropped);
        }
    }
}
