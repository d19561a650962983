//! Outbound HCI command packets.
//!
//! Packet layout:
//! ```text
//! Byte 0:    0x01 (command packet)
//! Byte 1-2:  opcode, little-endian
//! Byte 3:    parameter length
//! Byte 4..:  parameters
//! ```

use heapless::Vec;

use super::{HciPacket, HCI_COMMAND_PKT};
use crate::config::AuthRequirements;
use crate::gatt::CharacteristicParams;

// Standard HCI
pub const OP_RESET: u16 = 0x0C03;
pub const OP_READ_LOCAL_VERSION: u16 = 0x1001;
pub const OP_LE_SET_SCAN_RESPONSE_DATA: u16 = 0x2009;

// ACI HAL
pub const OP_HAL_WRITE_CONFIG_DATA: u16 = 0xFC0C;
pub const OP_HAL_READ_CONFIG_DATA: u16 = 0xFC0D;
pub const OP_HAL_SET_TX_POWER_LEVEL: u16 = 0xFC0F;

// ACI GAP
pub const OP_GAP_SET_DISCOVERABLE: u16 = 0xFC83;
pub const OP_GAP_SET_AUTH_REQUIREMENT: u16 = 0xFC86;
pub const OP_GAP_PASS_KEY_RESP: u16 = 0xFC88;
pub const OP_GAP_INIT: u16 = 0xFC8A;
pub const OP_GAP_SLAVE_SECURITY_REQ: u16 = 0xFC8D;
pub const OP_GAP_UPDATE_ADV_DATA: u16 = 0xFC8E;

// ACI GATT
pub const OP_GATT_INIT: u16 = 0xFD01;
pub const OP_GATT_ADD_SERVICE: u16 = 0xFD02;
pub const OP_GATT_ADD_CHAR: u16 = 0xFD04;
pub const OP_GATT_UPDATE_CHAR_VALUE: u16 = 0xFD06;
pub const OP_GATT_ALLOW_READ: u16 = 0xFD27;

/// GAP peripheral role for `aci_gap_init`.
pub const GAP_PERIPHERAL_ROLE: u8 = 0x01;

/// Advertising type: connectable undirected.
pub const ADV_IND: u8 = 0x00;

/// Own address type: public.
pub const PUBLIC_ADDR: u8 = 0x00;

/// Advertising filter policy: accept everything.
pub const NO_WHITE_LIST_USE: u8 = 0x00;

const UUID_TYPE_128: u8 = 0x02;
const PRIMARY_SERVICE: u8 = 0x01;

fn packet(opcode: u16, params: &[u8]) -> HciPacket {
    let mut p = Vec::new();
    let _ = p.push(HCI_COMMAND_PKT);
    let _ = p.extend_from_slice(&opcode.to_le_bytes());
    let _ = p.push(params.len() as u8);
    let _ = p.extend_from_slice(params);
    p
}

/// Parameters of an ACI command, bounded to the HCI maximum.
type Params = Vec<u8, 255>;

pub fn reset() -> HciPacket {
    packet(OP_RESET, &[])
}

pub fn read_local_version() -> HciPacket {
    packet(OP_READ_LOCAL_VERSION, &[])
}

pub fn read_config_data(offset: u8) -> HciPacket {
    packet(OP_HAL_READ_CONFIG_DATA, &[offset])
}

pub fn write_config_data(offset: u8, data: &[u8]) -> HciPacket {
    let mut p = Params::new();
    let _ = p.push(offset);
    let _ = p.push(data.len() as u8);
    let _ = p.extend_from_slice(data);
    packet(OP_HAL_WRITE_CONFIG_DATA, &p)
}

pub fn set_tx_power_level(high_power: bool, pa_level: u8) -> HciPacket {
    packet(OP_HAL_SET_TX_POWER_LEVEL, &[high_power as u8, pa_level])
}

pub fn gatt_init() -> HciPacket {
    packet(OP_GATT_INIT, &[])
}

/// Peripheral role, privacy off.
pub fn gap_init(device_name_len: u8) -> HciPacket {
    packet(OP_GAP_INIT, &[GAP_PERIPHERAL_ROLE, 0x00, device_name_len])
}

pub fn update_char_value(service: u16, characteristic: u16, offset: u8, value: &[u8]) -> HciPacket {
    let mut p = Params::new();
    let _ = p.extend_from_slice(&service.to_le_bytes());
    let _ = p.extend_from_slice(&characteristic.to_le_bytes());
    let _ = p.push(offset);
    let _ = p.push(value.len() as u8);
    let _ = p.extend_from_slice(value);
    packet(OP_GATT_UPDATE_CHAR_VALUE, &p)
}

pub fn set_auth_requirement(auth: &AuthRequirements) -> HciPacket {
    let mut p = Params::new();
    let _ = p.extend_from_slice(&[
        auth.bonding as u8,
        auth.mitm_protection as u8,
        auth.secure_connections as u8,
        auth.keypress_notifications as u8,
        auth.min_key_size,
        auth.max_key_size,
        // 0x00 selects the fixed PIN.
        auth.fixed_pin.is_none() as u8,
    ]);
    let _ = p.extend_from_slice(&auth.fixed_pin.unwrap_or(0).to_le_bytes());
    let _ = p.push(auth.random_identity_address as u8);
    packet(OP_GAP_SET_AUTH_REQUIREMENT, &p)
}

pub fn add_service(uuid: &[u8; 16], max_attributes: u8) -> HciPacket {
    let mut p = Params::new();
    let _ = p.push(UUID_TYPE_128);
    let _ = p.extend_from_slice(uuid);
    let _ = p.push(PRIMARY_SERVICE);
    let _ = p.push(max_attributes);
    packet(OP_GATT_ADD_SERVICE, &p)
}

pub fn add_char(service: u16, characteristic: &CharacteristicParams) -> HciPacket {
    let mut p = Params::new();
    let _ = p.extend_from_slice(&service.to_le_bytes());
    let _ = p.push(UUID_TYPE_128);
    let _ = p.extend_from_slice(&characteristic.uuid);
    let _ = p.extend_from_slice(&characteristic.value_len.to_le_bytes());
    let _ = p.extend_from_slice(&[
        characteristic.properties,
        characteristic.permissions,
        characteristic.event_mask,
        characteristic.encryption_key_size,
        characteristic.variable_length as u8,
    ]);
    packet(OP_GATT_ADD_CHAR, &p)
}

/// Empty scan response.
pub fn clear_scan_response() -> HciPacket {
    packet(OP_LE_SET_SCAN_RESPONSE_DATA, &[0u8; 32])
}

/// Connectable undirected advertising with no service UUID list and no
/// preferred connection interval.
pub fn set_discoverable(interval_min: u16, interval_max: u16, local_name: &[u8]) -> HciPacket {
    let mut p = Params::new();
    let _ = p.push(ADV_IND);
    let _ = p.extend_from_slice(&interval_min.to_le_bytes());
    let _ = p.extend_from_slice(&interval_max.to_le_bytes());
    let _ = p.push(PUBLIC_ADDR);
    let _ = p.push(NO_WHITE_LIST_USE);
    let _ = p.push(local_name.len() as u8);
    let _ = p.extend_from_slice(local_name);
    let _ = p.push(0);
    let _ = p.extend_from_slice(&[0, 0, 0, 0]);
    packet(OP_GAP_SET_DISCOVERABLE, &p)
}

pub fn update_adv_data(data: &[u8]) -> HciPacket {
    let mut p = Params::new();
    let _ = p.push(data.len() as u8);
    let _ = p.extend_from_slice(data);
    packet(OP_GAP_UPDATE_ADV_DATA, &p)
}

pub fn slave_security_request(connection: u16) -> HciPacket {
    packet(OP_GAP_SLAVE_SECURITY_REQ, &connection.to_le_bytes())
}

pub fn pass_key_response(connection: u16, passkey: u32) -> HciPacket {
    let mut p = [0u8; 6];
    p[..2].copy_from_slice(&connection.to_le_bytes());
    p[2..].copy_from_slice(&passkey.to_le_bytes());
    packet(OP_GAP_PASS_KEY_RESP, &p)
}

pub fn allow_read(connection: u16) -> HciPacket {
    packet(OP_GATT_ALLOW_READ, &connection.to_le_bytes())
}

/// Opcode of a packet built here.
pub fn opcode_of(packet: &[u8]) -> Option<u16> {
    super::le_u16(packet, 1)
}
