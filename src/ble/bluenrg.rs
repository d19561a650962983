//! BlueNRG-2 coprocessor driver (HCI over SPI).
//!
//! SPI transaction, mode 1, CS held low for the whole exchange:
//!
//! ```text
//! master → {0x0A | 0x0B, 0, 0, 0, 0}   write / read header
//! slave  → {ready, wbuf_lo, wbuf_hi, rbuf_lo, rbuf_hi}
//! ```
//!
//! After the header the master clocks out the packet (write) or clocks
//! in `rbuf` bytes (read). IRQ high means the coprocessor has data, or,
//! with CS low, that it is ready for the header.
//!
//! Every command waits for its matching Command Complete / Command
//! Status. Any other event seen in the meantime is queued and handed out
//! by [`BlueNrg::next_event`] in arrival order.
//!
//! There are two paths over the same framing:
//!
//! - `blocking_*` methods, used by bring-up before any other task runs
//!   ([`Transport`] and [`Stack`]);
//! - async methods, used by the radio task ([`AsyncTransport`]). These
//!   await the IRQ line and the SPI transfers, so the executor keeps
//!   running the glove and indicator tasks while a command is in flight.

use defmt::{debug, warn};
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiBus as AsyncSpiBus;
use heapless::{Deque, Vec};

use haptic_glove::adv::AdvertisingPayload;
use haptic_glove::config::{
    self, AuthRequirements, ADV_INTERVAL_MAX, ADV_INTERVAL_MIN, COMMAND_TIMEOUT_MS,
    COPROCESSOR_BOOT_MS,
};
use haptic_glove::gatt::{CharacteristicParams, GapHandles};
use haptic_glove::hci::event::{CommandDone, RawEvent};
use haptic_glove::hci::{command, HciPacket, HCI_MAX_PACKET_LEN};
use haptic_glove::transport::{
    AsyncTransport, FirmwareVersion, Stack, Transport, TransportError,
};

const HEADER_WRITE: u8 = 0x0A;
const HEADER_READ: u8 = 0x0B;

/// Upper bound on the wait for IRQ after CS goes low (ms).
const WAKE_TIMEOUT_MS: u64 = 10;

/// Events held back while a command waits for its completion.
pub const PENDING_EVENTS: usize = 8;

/// Return parameters of a completed command.
type Returns = Vec<u8, 32>;

pub struct BlueNrg<SPI, CS, IRQ, RST, D> {
    spi: SPI,
    cs: CS,
    irq: IRQ,
    reset: RST,
    delay: D,
    pending: Deque<HciPacket, PENDING_EVENTS>,
    dropped: u32,
}

fn rx_len(header: &[u8; 5]) -> usize {
    u16::from_le_bytes([header[3], header[4]]) as usize
}

fn tx_room(header: &[u8; 5]) -> usize {
    u16::from_le_bytes([header[1], header[2]]) as usize
}

fn command_deadline() -> Instant {
    Instant::now() + Duration::from_millis(COMMAND_TIMEOUT_MS as u64)
}

impl<SPI, CS, IRQ, RST, D> BlueNrg<SPI, CS, IRQ, RST, D> {
    pub fn new(spi: SPI, cs: CS, irq: IRQ, reset: RST, delay: D) -> Self {
        Self {
            spi,
            cs,
            irq,
            reset,
            delay,
            pending: Deque::new(),
            dropped: 0,
        }
    }

    /// Events lost because the pending queue was full.
    pub fn dropped_events(&self) -> u32 {
        self.dropped
    }

    /// Match `event` against the command in flight. `None` means keep
    /// waiting; unrelated events are queued.
    fn complete(&mut self, opcode: u16, event: HciPacket) -> Option<Result<Returns, TransportError>> {
        let done = RawEvent::parse(&event)
            .ok()
            .and_then(|raw| CommandDone::from_event(&raw))
            .map(|done| (done.opcode, done.status, Returns::from_slice(done.returns)));
        match done {
            Some((op, 0, returns)) if op == opcode => {
                Some(returns.map_err(|_| TransportError::Malformed))
            }
            Some((op, status, _)) if op == opcode => Some(Err(TransportError::Status(status))),
            Some((op, _, _)) => {
                debug!("bluenrg: stray completion for {=u16:#x}", op);
                None
            }
            None => {
                self.hold(event);
                None
            }
        }
    }

    fn hold(&mut self, event: HciPacket) {
        if self.pending.push_back(event).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }

    fn handle_reply(returns: &[u8]) -> Result<u16, TransportError> {
        returns
            .get(..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or(TransportError::Malformed)
    }
}

impl<SPI, CS, IRQ, RST, D> BlueNrg<SPI, CS, IRQ, RST, D>
where
    CS: OutputPin,
    IRQ: InputPin,
{
    fn irq_high(&mut self) -> Result<bool, TransportError> {
        self.irq.is_high().map_err(|_| TransportError::Bus)
    }

    fn select(&mut self) -> Result<(), TransportError> {
        self.cs.set_low().map_err(|_| TransportError::Bus)
    }

    fn deselect(&mut self) -> Result<(), TransportError> {
        self.cs.set_high().map_err(|_| TransportError::Bus)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Blocking path (bring-up)
// ═══════════════════════════════════════════════════════════════════════════

impl<SPI, CS, IRQ, RST, D> BlueNrg<SPI, CS, IRQ, RST, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    IRQ: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn blocking_header(&mut self, kind: u8) -> Result<[u8; 5], TransportError> {
        let mut header = [kind, 0, 0, 0, 0];
        self.spi
            .transfer_in_place(&mut header)
            .map_err(|_| TransportError::Bus)?;
        Ok(header)
    }

    /// Read one packet if the coprocessor has one.
    fn blocking_read_packet(&mut self) -> Result<Option<HciPacket>, TransportError> {
        if !self.irq_high()? {
            return Ok(None);
        }
        self.select()?;
        let result = self.blocking_read_selected();
        let flushed = self.spi.flush().map_err(|_| TransportError::Bus);
        self.deselect()?;
        flushed?;
        result
    }

    fn blocking_read_selected(&mut self) -> Result<Option<HciPacket>, TransportError> {
        let header = self.blocking_header(HEADER_READ)?;
        let len = rx_len(&header);
        if len == 0 {
            return Ok(None);
        }
        let mut packet = HciPacket::new();
        packet
            .resize(len.min(HCI_MAX_PACKET_LEN), 0xFF)
            .map_err(|_| TransportError::Malformed)?;
        self.spi
            .transfer_in_place(&mut packet)
            .map_err(|_| TransportError::Bus)?;
        Ok(Some(packet))
    }

    fn blocking_write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let mut waited = 0;
        loop {
            self.select()?;
            // IRQ rises once the coprocessor is awake and ready for the header.
            let mut spins = 0;
            while !self.irq_high()? && spins < WAKE_TIMEOUT_MS * 100 {
                self.delay.delay_us(10);
                spins += 1;
            }
            let header = self.blocking_header(HEADER_WRITE)?;
            let written = if tx_room(&header) >= packet.len() {
                Some(self.spi.write(packet).map_err(|_| TransportError::Bus))
            } else {
                None
            };
            self.spi.flush().map_err(|_| TransportError::Bus)?;
            self.deselect()?;
            if let Some(written) = written {
                return written;
            }
            if waited >= COMMAND_TIMEOUT_MS {
                return Err(TransportError::Timeout);
            }
            self.delay.delay_ms(1);
            waited += 1;
        }
    }

    /// Send a command and spin until its completion.
    fn blocking_command(&mut self, packet: &[u8]) -> Result<Returns, TransportError> {
        let opcode = command::opcode_of(packet).ok_or(TransportError::Malformed)?;
        self.blocking_write_packet(packet)?;

        let mut waited = 0;
        loop {
            let Some(event) = self.blocking_read_packet()? else {
                if waited >= COMMAND_TIMEOUT_MS {
                    warn!("bluenrg: no completion for {=u16:#x}", opcode);
                    return Err(TransportError::Timeout);
                }
                self.delay.delay_ms(1);
                waited += 1;
                continue;
            };
            if let Some(result) = self.complete(opcode, event) {
                return result;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Async path (radio task)
// ═══════════════════════════════════════════════════════════════════════════

impl<SPI, CS, IRQ, RST, D> BlueNrg<SPI, CS, IRQ, RST, D>
where
    SPI: AsyncSpiBus,
    CS: OutputPin,
    IRQ: InputPin + Wait,
    D: AsyncDelayNs,
{
    /// Resolve once an event can be read. Safe to cancel.
    pub async fn event_ready(&mut self) -> Result<(), TransportError> {
        if !self.pending.is_empty() {
            return Ok(());
        }
        self.irq.wait_for_high().await.map_err(|_| TransportError::Bus)
    }

    /// Next inbound event packet, queued ones first. `None` if the
    /// coprocessor had nothing after all.
    ///
    /// Not cancel-safe: a dropped read leaves CS asserted. Race
    /// [`Self::event_ready`] instead.
    pub async fn next_event(&mut self) -> Result<Option<HciPacket>, TransportError> {
        if let Some(packet) = self.pending.pop_front() {
            return Ok(Some(packet));
        }
        self.read_packet().await
    }

    async fn header(&mut self, kind: u8) -> Result<[u8; 5], TransportError> {
        let mut header = [kind, 0, 0, 0, 0];
        self.spi.transfer_in_place(&mut header)
            .await
            .map_err(|_| TransportError::Bus)?;
        Ok(header)
    }

    async fn read_packet(&mut self) -> Result<Option<HciPacket>, TransportError> {
        if !self.irq_high()? {
            return Ok(None);
        }
        self.select()?;
        let result = self.read_selected().await;
        let flushed = self.spi.flush()
            .await
            .map_err(|_| TransportError::Bus);
        self.deselect()?;
        flushed?;
        result
    }

    async fn read_selected(&mut self) -> Result<Option<HciPacket>, TransportError> {
        let header = self.header(HEADER_READ).await?;
        let len = rx_len(&header);
        if len == 0 {
            return Ok(None);
        }
        let mut packet = HciPacket::new();
        packet
            .resize(len.min(HCI_MAX_PACKET_LEN), 0xFF)
            .map_err(|_| TransportError::Malformed)?;
        self.spi.transfer_in_place(&mut packet)
            .await
            .map_err(|_| TransportError::Bus)?;
        Ok(Some(packet))
    }

    async fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let deadline = command_deadline();
        loop {
            self.select()?;
            // A missed wake-up still gets a header; the slave reports no room.
            let _ = with_timeout(Duration::from_millis(WAKE_TIMEOUT_MS), self.irq.wait_for_high()).await;
            let header = self.header(HEADER_WRITE).await?;
            let written = if tx_room(&header) >= packet.len() {
                Some(
                    self.spi.write(packet)
                        .await
                        .map_err(|_| TransportError::Bus),
                )
            } else {
                None
            };
            self.spi.flush()
                .await
                .map_err(|_| TransportError::Bus)?;
            self.deselect()?;
            if let Some(written) = written {
                return written;
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
            self.delay.delay_ms(1).await;
        }
    }

    /// Send a command and await its completion.
    async fn command(&mut self, packet: &[u8]) -> Result<Returns, TransportError> {
        let opcode = command::opcode_of(packet).ok_or(TransportError::Malformed)?;
        self.write_packet(packet).await?;

        let deadline = command_deadline();
        loop {
            if let Some(event) = self.read_packet().await? {
                if let Some(result) = self.complete(opcode, event) {
                    return result;
                }
                continue;
            }

            if Instant::now() >= deadline {
                warn!("bluenrg: no completion for {=u16:#x}", opcode);
                return Err(TransportError::Timeout);
            }
            if self.irq_high()? {
                // Header reported nothing yet.
                self.delay.delay_ms(1).await;
                continue;
            }
            match with_deadline(deadline, self.irq.wait_for_high()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(TransportError::Bus),
                Err(_) => {
                    warn!("bluenrg: no completion for {=u16:#x}", opcode);
                    return Err(TransportError::Timeout);
                }
            }
        }
    }
}

impl<SPI, CS, IRQ, RST, D> AsyncTransport for BlueNrg<SPI, CS, IRQ, RST, D>
where
    SPI: AsyncSpiBus,
    CS: OutputPin,
    IRQ: InputPin + Wait,
    D: AsyncDelayNs,
{
    async fn send_advertising_payload(
        &mut self,
        payload: &AdvertisingPayload,
    ) -> Result<(), TransportError> {
        self.command(&command::clear_scan_response()).await?;
        self.command(&command::set_discoverable(
            ADV_INTERVAL_MIN,
            ADV_INTERVAL_MAX,
            &payload.local_name,
        ))
        .await?;
        self.command(&command::update_adv_data(&payload.data)).await?;
        Ok(())
    }

    async fn request_pairing(&mut self, connection: u16) -> Result<(), TransportError> {
        self.command(&command::slave_security_request(connection)).await?;
        Ok(())
    }

    async fn respond_passkey(&mut self, connection: u16, passkey: u32) -> Result<(), TransportError> {
        self.command(&command::pass_key_response(connection, passkey)).await?;
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        service: u16,
        characteristic: u16,
        offset: u8,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.command(&command::update_char_value(service, characteristic, offset, value))
            .await?;
        Ok(())
    }

    async fn allow_read(&mut self, connection: u16) -> Result<(), TransportError> {
        self.command(&command::allow_read(connection)).await?;
        Ok(())
    }
}

impl<SPI, CS, IRQ, RST, D> Transport for BlueNrg<SPI, CS, IRQ, RST, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    IRQ: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn read_local_address(&mut self) -> Result<[u8; 6], TransportError> {
        let returns =
            self.blocking_command(&command::read_config_data(config::STATIC_RANDOM_ADDRESS_OFFSET))?;
        // Data_Length, then the data itself.
        let data = returns.get(1..7).ok_or(TransportError::Malformed)?;
        let mut address = [0u8; 6];
        address.copy_from_slice(data);
        Ok(address)
    }

    fn send_advertising_payload(&mut self, payload: &AdvertisingPayload) -> Result<(), TransportError> {
        self.blocking_command(&command::clear_scan_response())?;
        self.blocking_command(&command::set_discoverable(
            ADV_INTERVAL_MIN,
            ADV_INTERVAL_MAX,
            &payload.local_name,
        ))?;
        self.blocking_command(&command::update_adv_data(&payload.data))?;
        Ok(())
    }

    fn request_pairing(&mut self, connection: u16) -> Result<(), TransportError> {
        self.blocking_command(&command::slave_security_request(connection))?;
        Ok(())
    }

    fn respond_passkey(&mut self, connection: u16, passkey: u32) -> Result<(), TransportError> {
        self.blocking_command(&command::pass_key_response(connection, passkey))?;
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        service: u16,
        characteristic: u16,
        offset: u8,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.blocking_command(&command::update_char_value(service, characteristic, offset, value))?;
        Ok(())
    }

    fn allow_read(&mut self, connection: u16) -> Result<(), TransportError> {
        self.blocking_command(&command::allow_read(connection))?;
        Ok(())
    }
}

impl<SPI, CS, IRQ, RST, D> Stack for BlueNrg<SPI, CS, IRQ, RST, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    IRQ: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn reset(&mut self) -> Result<(), TransportError> {
        self.cs.set_high().map_err(|_| TransportError::Bus)?;
        self.reset.set_low().map_err(|_| TransportError::Bus)?;
        self.delay.delay_ms(5);
        self.reset.set_high().map_err(|_| TransportError::Bus)?;
        self.delay.delay_ms(COPROCESSOR_BOOT_MS);

        // Drop the start-up event and anything else left over.
        while self.blocking_read_packet()?.is_some() {}
        self.pending.clear();
        Ok(())
    }

    fn version(&mut self) -> Result<FirmwareVersion, TransportError> {
        let r = self.blocking_command(&command::read_local_version())?;
        if r.len() < 8 {
            return Err(TransportError::Malformed);
        }
        let hci_revision = u16::from_le_bytes([r[1], r[2]]);
        let lmp_subversion = u16::from_le_bytes([r[6], r[7]]);
        Ok(FirmwareVersion::from_hci(hci_revision, lmp_subversion))
    }

    fn set_public_address(&mut self, address: [u8; 6]) -> Result<(), TransportError> {
        self.blocking_command(&command::write_config_data(config::PUBLIC_ADDRESS_OFFSET, &address))?;
        Ok(())
    }

    fn set_tx_power(&mut self, high_power: bool, pa_level: u8) -> Result<(), TransportError> {
        self.blocking_command(&command::set_tx_power_level(high_power, pa_level))?;
        Ok(())
    }

    fn init_gatt(&mut self) -> Result<(), TransportError> {
        self.blocking_command(&command::gatt_init())?;
        Ok(())
    }

    fn init_gap(&mut self, name_len: u8) -> Result<GapHandles, TransportError> {
        let r = self.blocking_command(&command::gap_init(name_len))?;
        if r.len() < 6 {
            return Err(TransportError::Malformed);
        }
        Ok(GapHandles {
            service: Self::handle_reply(&r[0..2])?,
            device_name: Self::handle_reply(&r[2..4])?,
            appearance: Self::handle_reply(&r[4..6])?,
        })
    }

    fn set_authentication(&mut self, auth: &AuthRequirements) -> Result<(), TransportError> {
        self.blocking_command(&command::set_auth_requirement(auth))?;
        Ok(())
    }

    fn add_service(&mut self, uuid: &[u8; 16], max_attributes: u8) -> Result<u16, TransportError> {
        let r = self.blocking_command(&command::add_service(uuid, max_attributes))?;
        Self::handle_reply(&r)
    }

    fn add_characteristic(
        &mut self,
        service: u16,
        params: &CharacteristicParams,
    ) -> Result<u16, TransportError> {
        let r = self.blocking_command(&command::add_char(service, params))?;
        Self::handle_reply(&r)
    }
}
