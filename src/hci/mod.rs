//! HCI framing between the MCU and the BlueNRG-2 coprocessor.
//!
//! - [`event`] splits inbound event packets into a kind, a sub-code and
//!   parameters, and decodes the parameters of the events we track.
//! - [`command`] builds outbound command packets for the standard HCI and
//!   vendor (ACI) commands used by the glove.

pub mod command;
pub mod event;

/// Packet indicator: command.
pub const HCI_COMMAND_PKT: u8 = 0x01;
/// Packet indicator: event.
pub const HCI_EVENT_PKT: u8 = 0x04;

/// Largest HCI packet: indicator + 2-byte header + 255 parameter bytes.
pub const HCI_MAX_PACKET_LEN: usize = 3 + 255;

/// An owned HCI packet.
pub type HciPacket = heapless::Vec<u8, HCI_MAX_PACKET_LEN>;

/// Read a little-endian `u16` at `at`, if present.
pub(crate) fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}
