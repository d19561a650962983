//! Inbound HCI event records.
//!
//! Packet layout:
//! ```text
//! Byte 0:    0x04 (event packet)
//! Byte 1:    event code
//! Byte 2:    parameter length
//! Byte 3..:  parameters
//! ```
//!
//! LE meta events (`0x3E`) carry a one-byte subevent code first; vendor
//! events (`0xFF`) carry a little-endian 16-bit ACI event code first.

use super::{le_u16, HCI_EVENT_PKT};

// Event codes
pub const EVT_DISCONNECTION_COMPLETE: u8 = 0x05;
pub const EVT_COMMAND_COMPLETE: u8 = 0x0E;
pub const EVT_COMMAND_STATUS: u8 = 0x0F;
pub const EVT_LE_META: u8 = 0x3E;
pub const EVT_VENDOR: u8 = 0xFF;

// LE meta subevents
pub const LE_CONNECTION_COMPLETE: u16 = 0x01;
pub const LE_ENHANCED_CONNECTION_COMPLETE: u16 = 0x0A;

// Vendor (ACI) event codes
pub const ACI_GAP_PAIRING_COMPLETE: u16 = 0x0401;
pub const ACI_GAP_PASS_KEY_REQ: u16 = 0x0402;
pub const ACI_GATT_ATTRIBUTE_MODIFIED: u16 = 0x0C01;
pub const ACI_GATT_READ_PERMIT_REQ: u16 = 0x0C14;

/// Top-level class of an event record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// LE meta event; code is the subevent.
    LeMeta,
    /// Vendor event; code is the ACI event code.
    Vendor,
    /// Any other HCI event; code is the event code.
    Generic,
}

/// Why a packet could not be split into an event record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// The packet indicator is not `0x04`.
    NotAnEvent(u8),
    /// The packet is shorter than its header says.
    Truncated,
}

/// One inbound event, borrowed from the packet buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent<'a> {
    pub kind: EventKind,
    pub code: u16,
    /// Parameters following the sub-code.
    pub params: &'a [u8],
}

impl<'a> RawEvent<'a> {
    /// Split a complete HCI event packet.
    pub fn parse(packet: &'a [u8]) -> Result<Self, FrameError> {
        let (&indicator, rest) = packet.split_first().ok_or(FrameError::Truncated)?;
        if indicator != HCI_EVENT_PKT {
            return Err(FrameError::NotAnEvent(indicator));
        }
        let (&evt, rest) = rest.split_first().ok_or(FrameError::Truncated)?;
        let (&plen, rest) = rest.split_first().ok_or(FrameError::Truncated)?;
        let params = rest.get(..plen as usize).ok_or(FrameError::Truncated)?;

        match evt {
            EVT_LE_META => {
                let (&sub, params) = params.split_first().ok_or(FrameError::Truncated)?;
                Ok(Self { kind: EventKind::LeMeta, code: sub as u16, params })
            }
            EVT_VENDOR => {
                let code = le_u16(params, 0).ok_or(FrameError::Truncated)?;
                Ok(Self { kind: EventKind::Vendor, code, params: &params[2..] })
            }
            _ => Ok(Self { kind: EventKind::Generic, code: evt as u16, params }),
        }
    }
}

/// LE (enhanced) connection complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionComplete {
    pub status: u8,
    pub connection: u16,
    pub role: u8,
    pub peer_address_type: u8,
    pub peer_address: [u8; 6],
    pub interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl ConnectionComplete {
    /// Legacy layout (subevent `0x01`).
    pub fn parse(params: &[u8]) -> Option<Self> {
        Self::parse_with_gap(params, 0)
    }

    /// Enhanced layout (subevent `0x0A`): two resolvable addresses sit
    /// between the peer address and the timing fields.
    pub fn parse_enhanced(params: &[u8]) -> Option<Self> {
        Self::parse_with_gap(params, 12)
    }

    fn parse_with_gap(params: &[u8], gap: usize) -> Option<Self> {
        if params.len() < 18 + gap {
            return None;
        }
        let mut peer_address = [0u8; 6];
        peer_address.copy_from_slice(&params[5..11]);
        let timing = 11 + gap;
        Some(Self {
            status: params[0],
            connection: le_u16(params, 1)?,
            role: params[3],
            peer_address_type: params[4],
            peer_address,
            interval: le_u16(params, timing)?,
            latency: le_u16(params, timing + 2)?,
            supervision_timeout: le_u16(params, timing + 4)?,
        })
    }
}

/// Disconnection complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Disconnection {
    pub status: u8,
    pub connection: u16,
    pub reason: u8,
}

impl Disconnection {
    pub fn parse(params: &[u8]) -> Option<Self> {
        Some(Self {
            status: *params.first()?,
            connection: le_u16(params, 1)?,
            reason: *params.get(3)?,
        })
    }
}

/// Outcome of a pairing procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingComplete {
    pub connection: u16,
    /// 0x00 success, 0x01 timeout, 0x02 failed.
    pub status: u8,
    pub reason: u8,
}

impl PairingComplete {
    pub fn parse(params: &[u8]) -> Option<Self> {
        Some(Self {
            connection: le_u16(params, 0)?,
            status: *params.get(2)?,
            reason: *params.get(3)?,
        })
    }
}

/// The security manager wants the passkey.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PasskeyRequest {
    pub connection: u16,
}

impl PasskeyRequest {
    pub fn parse(params: &[u8]) -> Option<Self> {
        Some(Self { connection: le_u16(params, 0)? })
    }
}

/// A peer wrote an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeModified<'a> {
    pub connection: u16,
    pub attribute: u16,
    pub offset: u16,
    pub data: &'a [u8],
}

impl<'a> AttributeModified<'a> {
    /// `None` if the declared data length runs past the parameters.
    pub fn parse(params: &'a [u8]) -> Option<Self> {
        let len = le_u16(params, 6)? as usize;
        let data = params.get(8..8 + len)?;
        Some(Self {
            connection: le_u16(params, 0)?,
            attribute: le_u16(params, 2)?,
            offset: le_u16(params, 4)?,
            data,
        })
    }
}

/// A peer wants to read an attribute that requires permission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadPermitRequest {
    pub connection: u16,
    pub attribute: u16,
    pub offset: u16,
}

impl ReadPermitRequest {
    pub fn parse(params: &[u8]) -> Option<Self> {
        Some(Self {
            connection: le_u16(params, 0)?,
            attribute: le_u16(params, 2)?,
            offset: le_u16(params, 4)?,
        })
    }
}

/// Completion of a command: either Command Complete or Command Status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandDone<'a> {
    pub opcode: u16,
    pub status: u8,
    /// Return parameters after the status byte (empty for Command Status).
    pub returns: &'a [u8],
}

impl<'a> CommandDone<'a> {
    /// Recognise a completion among generic events.
    pub fn from_event(event: &RawEvent<'a>) -> Option<Self> {
        if event.kind != EventKind::Generic {
            return None;
        }
        let p = event.params;
        match event.code as u8 {
            EVT_COMMAND_COMPLETE => {
                let opcode = le_u16(p, 1)?;
                let status = *p.get(3)?;
                Some(Self { opcode, status, returns: &p[4..] })
            }
            EVT_COMMAND_STATUS => {
                let status = *p.first()?;
                let opcode = le_u16(p, 2)?;
                Some(Self { opcode, status, returns: &[] })
            }
            _ => None,
        }
    }
}
