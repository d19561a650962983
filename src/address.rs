//! The device's own BLE address.
//!
//! The BlueNRG-2 keeps a factory static random address in its config
//! store. Bytes are little-endian (byte 5 is the most significant), and
//! a static random address must have its two top bits set.

use core::fmt;

use crate::error::Error;

/// Bit pattern required in the top two bits of a static random address.
const STATIC_RANDOM_MARKER: u8 = 0xC0;

/// A validated static random device address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Validate raw config-store bytes.
    pub fn from_config_bytes(bytes: [u8; 6]) -> Result<Self, Error> {
        if bytes[5] & STATIC_RANDOM_MARKER != STATIC_RANDOM_MARKER {
            return Err(Error::MalformedAddress);
        }
        Ok(Self(bytes))
    }

    /// Little-endian bytes, as exchanged with the controller.
    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Bytes most-significant first, as printed and advertised.
    pub fn msb_first(&self) -> [u8; 6] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.msb_first();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_static_random_marker() {
        let addr = DeviceAddress::from_config_bytes([0x01, 0x02, 0x03, 0x04, 0x05, 0xC6]).unwrap();
        assert_eq!(addr.bytes()[5], 0xC6);
        assert_eq!(addr.msb_first(), [0xC6, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn rejects_missing_marker_bits() {
        for top in [0x00, 0x40, 0x80, 0x3F, 0xBF] {
            assert_eq!(
                DeviceAddress::from_config_bytes([0, 0, 0, 0, 0, top]),
                Err(Error::MalformedAddress)
            );
        }
    }

    #[test]
    fn display_is_msb_first() {
        let addr = DeviceAddress::from_config_bytes([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]).unwrap();
        assert_eq!(addr.to_string(), "FF:EE:DD:CC:BB:AA");
    }
}
