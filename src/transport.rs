//! Boundary with the BLE transport.
//!
//! The core never talks to the radio directly. It emits [`Request`]s,
//! and whoever owns the radio executes them against an
//! [`AsyncTransport`]. Bring-up runs before the event loop and uses the
//! blocking [`Transport`] and [`Stack`] operations.

use core::fmt;

use crate::adv::AdvertisingPayload;
use crate::codec::GRID_FRAME_LEN;
use crate::config::AuthRequirements;
use crate::error::Error;
use crate::gatt::{CharacteristicParams, GapHandles};

/// Failure reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The controller completed the command with a non-zero status.
    Status(u8),
    /// No completion arrived in time.
    Timeout,
    /// The underlying bus failed.
    Bus,
    /// The completion could not be parsed.
    Malformed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Status(status) => write!(f, "status {status:#04x}"),
            TransportError::Timeout => f.write_str("timeout"),
            TransportError::Bus => f.write_str("bus error"),
            TransportError::Malformed => f.write_str("malformed response"),
        }
    }
}

/// Operations the session and codec need at runtime.
pub trait Transport {
    /// Read the factory static random address from the config store.
    fn read_local_address(&mut self) -> Result<[u8; 6], TransportError>;

    /// Make the device discoverable with `payload`.
    fn send_advertising_payload(
        &mut self,
        payload: &AdvertisingPayload,
    ) -> Result<(), TransportError>;

    /// Ask the peer to start pairing.
    fn request_pairing(&mut self, connection: u16) -> Result<(), TransportError>;

    /// Answer a passkey request.
    fn respond_passkey(&mut self, connection: u16, passkey: u32) -> Result<(), TransportError>;

    /// Update a characteristic value (notifying subscribed peers).
    fn write_characteristic(
        &mut self,
        service: u16,
        characteristic: u16,
        offset: u8,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Let a pending read request proceed.
    fn allow_read(&mut self, connection: u16) -> Result<(), TransportError>;
}

/// The runtime subset of [`Transport`], awaited from the radio task.
#[allow(async_fn_in_trait)]
pub trait AsyncTransport {
    async fn send_advertising_payload(
        &mut self,
        payload: &AdvertisingPayload,
    ) -> Result<(), TransportError>;

    async fn request_pairing(&mut self, connection: u16) -> Result<(), TransportError>;

    async fn respond_passkey(&mut self, connection: u16, passkey: u32)
        -> Result<(), TransportError>;

    async fn write_characteristic(
        &mut self,
        service: u16,
        characteristic: u16,
        offset: u8,
        value: &[u8],
    ) -> Result<(), TransportError>;

    async fn allow_read(&mut self, connection: u16) -> Result<(), TransportError>;
}

/// Version information reported by the coprocessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub hardware: u8,
    /// `0xMMmp`: major byte, minor nibble, patch nibble.
    pub firmware: u16,
}

impl FirmwareVersion {
    /// Derive from the HCI local version information.
    pub fn from_hci(hci_revision: u16, lmp_subversion: u16) -> Self {
        let hardware = (hci_revision >> 8) as u8;
        let firmware = ((hci_revision & 0xFF) << 8)
            | (((lmp_subversion >> 4) & 0xF) << 4)
            | (lmp_subversion & 0xF);
        Self { hardware, firmware }
    }
}

/// Operations only needed while bringing the stack up.
pub trait Stack: Transport {
    fn reset(&mut self) -> Result<(), TransportError>;

    fn version(&mut self) -> Result<FirmwareVersion, TransportError>;

    fn set_public_address(&mut self, address: [u8; 6]) -> Result<(), TransportError>;

    fn set_tx_power(&mut self, high_power: bool, pa_level: u8) -> Result<(), TransportError>;

    fn init_gatt(&mut self) -> Result<(), TransportError>;

    /// Initialise the peripheral GAP role with a `name_len`-byte device name.
    fn init_gap(&mut self, name_len: u8) -> Result<GapHandles, TransportError>;

    fn set_authentication(&mut self, auth: &AuthRequirements) -> Result<(), TransportError>;

    /// Add a primary 128-bit service, returning its handle.
    fn add_service(&mut self, uuid: &[u8; 16], max_attributes: u8) -> Result<u16, TransportError>;

    /// Add a characteristic, returning its declaration handle.
    fn add_characteristic(
        &mut self,
        service: u16,
        params: &CharacteristicParams,
    ) -> Result<u16, TransportError>;
}

/// Work the core hands to the radio owner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    SetDiscoverable(AdvertisingPayload),
    RequestPairing { connection: u16 },
    RespondPasskey { connection: u16, passkey: u32 },
    UpdateGrid { service: u16, characteristic: u16, frame: [u8; GRID_FRAME_LEN] },
    AllowRead { connection: u16 },
}

impl Request {
    /// Run the request, mapping a transport failure to its session error.
    pub fn execute<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), Error> {
        let result = match self {
            Request::SetDiscoverable(payload) => transport.send_advertising_payload(payload),
            Request::RequestPairing { connection } => transport.request_pairing(*connection),
            Request::RespondPasskey { connection, passkey } => {
                transport.respond_passkey(*connection, *passkey)
            }
            Request::UpdateGrid { service, characteristic, frame } => {
                transport.write_characteristic(*service, *characteristic, 0, frame)
            }
            Request::AllowRead { connection } => transport.allow_read(*connection),
        };
        result.map_err(|e| self.failure(e))
    }

    /// [`Request::execute`] against an async transport.
    pub async fn execute_async<T: AsyncTransport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<(), Error> {
        let result = match self {
            Request::SetDiscoverable(payload) => transport.send_advertising_payload(payload).await,
            Request::RequestPairing { connection } => transport.request_pairing(*connection).await,
            Request::RespondPasskey { connection, passkey } => {
                transport.respond_passkey(*connection, *passkey).await
            }
            Request::UpdateGrid { service, characteristic, frame } => {
                transport
                    .write_characteristic(*service, *characteristic, 0, frame)
                    .await
            }
            Request::AllowRead { connection } => transport.allow_read(*connection).await,
        };
        result.map_err(|e| self.failure(e))
    }

    fn failure(&self, e: TransportError) -> Error {
        match self {
            Request::SetDiscoverable(_) => Error::AdvertisingFailed(e),
            Request::RequestPairing { .. } => Error::PairingRequestFailed(e),
            Request::RespondPasskey { .. } => Error::PasskeyResponseFailed(e),
            Request::UpdateGrid { .. } => Error::TelemetryFailed(e),
            Request::AllowRead { .. } => Error::ReadPermitFailed(e),
        }
    }
}
