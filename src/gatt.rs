//! GATT layout of the glove.
//!
//! One primary service with a single Grid characteristic. UUIDs are kept
//! in the little-endian byte order the coprocessor expects on the wire.

use crate::codec::GRID_FRAME_LEN;

/// Grid service `00000000-0002-11e1-9ab4-0002a5d5c51b`.
pub const GRID_SERVICE_UUID: [u8; 16] = uuid_le(0x00000000_0002_11e1_9ab4_0002a5d5c51b);

/// Grid characteristic `00000001-0001-11e1-ac36-0002a5d5c51b`.
pub const GRID_CHAR_UUID: [u8; 16] = uuid_le(0x00000001_0001_11e1_ac36_0002a5d5c51b);

/// Service declaration + one characteristic (declaration, value, CCCD).
pub const GRID_SERVICE_MAX_ATTRIBUTES: u8 = 1 + 3;

// Characteristic properties.
pub const CHAR_PROP_READ: u8 = 0x02;
pub const CHAR_PROP_WRITE: u8 = 0x08;
pub const CHAR_PROP_NOTIFY: u8 = 0x10;

/// No security permission on the attribute.
pub const ATTR_PERMISSION_NONE: u8 = 0x00;

/// Ask the stack to forward attribute writes to the application.
pub const GATT_NOTIFY_ATTRIBUTE_WRITE: u8 = 0x01;

/// CCCD bit enabling notifications.
pub const CCCD_NOTIFY: u16 = 0x0001;

const fn uuid_le(uuid: u128) -> [u8; 16] {
    uuid.to_le_bytes()
}

/// Parameters of a characteristic to register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicParams {
    pub uuid: [u8; 16],
    pub value_len: u16,
    pub properties: u8,
    pub permissions: u8,
    pub event_mask: u8,
    pub encryption_key_size: u8,
    pub variable_length: bool,
}

/// The Grid characteristic as registered at bring-up.
pub const GRID_CHARACTERISTIC: CharacteristicParams = CharacteristicParams {
    uuid: GRID_CHAR_UUID,
    value_len: GRID_FRAME_LEN as u16,
    properties: CHAR_PROP_NOTIFY | CHAR_PROP_READ | CHAR_PROP_WRITE,
    permissions: ATTR_PERMISSION_NONE,
    event_mask: GATT_NOTIFY_ATTRIBUTE_WRITE,
    encryption_key_size: 16,
    variable_length: false,
};

/// Handles returned by the GAP layer initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GapHandles {
    pub service: u16,
    pub device_name: u16,
    pub appearance: u16,
}

/// Handles of the registered Grid service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GattHandles {
    pub service: u16,
    /// Characteristic declaration handle.
    pub grid: u16,
}

impl GattHandles {
    /// Handle carrying the Grid value.
    pub fn grid_value(&self) -> u16 {
        self.grid.wrapping_add(1)
    }

    /// Client characteristic configuration descriptor of the Grid.
    pub fn grid_cccd(&self) -> u16 {
        self.grid.wrapping_add(2)
    }
}
