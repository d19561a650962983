//! Advertising payload.
//!
//! The advertising data follows the BlueST manufacturer layout so the
//! ST tooling and the controller app both recognise the glove:
//!
//! ```text
//! [len=2,  0x0A, tx_power]                       TX power level
//! [len=n+1, 0x09, name...]                       complete local name
//! [len=13, 0xFF, ver, dev_id, mask[4], mac[6]]   manufacturer data
//! ```
//!
//! The MAC is written most-significant byte first.

use heapless::Vec;

use crate::address::DeviceAddress;

/// AD type: complete local name.
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// AD type: TX power level.
pub const AD_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;

/// Legacy advertising data limit.
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Longest name that still fits next to the other two structures.
pub const MAX_NAME_LEN: usize = MAX_ADV_DATA_LEN - 3 - 14 - 2;

const BLUEST_PROTOCOL_VERSION: u8 = 0x01;
const BLUEST_DEVICE_ID: u8 = 0x80;
const BLUEST_FEATURE_MASK: [u8; 4] = [0x00, 0xF4, 0x00, 0x01];

/// Everything the transport needs to make the device discoverable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingPayload {
    /// `[0x09, name...]`, as taken by the set-discoverable command.
    pub local_name: Vec<u8, { MAX_NAME_LEN + 1 }>,
    /// Full advertising data.
    pub data: Vec<u8, MAX_ADV_DATA_LEN>,
}

impl AdvertisingPayload {
    /// Build the payload. Names longer than [`MAX_NAME_LEN`] are truncated.
    pub fn new(name: &str, tx_power_dbm: i8, address: &DeviceAddress) -> Self {
        let name = &name.as_bytes()[..name.len().min(MAX_NAME_LEN)];

        let mut local_name = Vec::new();
        let _ = local_name.push(AD_TYPE_COMPLETE_LOCAL_NAME);
        let _ = local_name.extend_from_slice(name);

        let mut data = Vec::new();
        let _ = data.extend_from_slice(&[2, AD_TYPE_TX_POWER_LEVEL, tx_power_dbm as u8]);
        let _ = data.push(name.len() as u8 + 1);
        let _ = data.push(AD_TYPE_COMPLETE_LOCAL_NAME);
        let _ = data.extend_from_slice(name);
        let _ = data.extend_from_slice(&[
            13,
            AD_TYPE_MANUFACTURER_SPECIFIC,
            BLUEST_PROTOCOL_VERSION,
            BLUEST_DEVICE_ID,
        ]);
        let _ = data.extend_from_slice(&BLUEST_FEATURE_MASK);
        let _ = data.extend_from_slice(&address.msb_first());

        Self { local_name, data }
    }
}
