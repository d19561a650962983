//! Application-wide constants and compile-time configuration.
//!
//! All pin assignments, timing parameters, and protocol constants live
//! here so they can be tuned in one place.

use crate::actuation::{ActuatorChannel, PwmChannel, PwmInstance};
use crate::codec::GRID_SLOTS;

// Device identity

/// Advertised device name. The GAP layer was initialised for a
/// 7-byte name, so keep the length in sync with [`DEVICE_NAME_LEN`].
pub const DEVICE_NAME: &str = "Haptic ";

/// Length of the GAP device-name characteristic.
pub const DEVICE_NAME_LEN: u8 = 7;

/// Offset of the static random address in the coprocessor config store.
pub const STATIC_RANDOM_ADDRESS_OFFSET: u8 = 0x80;

/// Offset of the public address in the coprocessor config store.
pub const PUBLIC_ADDRESS_OFFSET: u8 = 0x00;

// Security

/// Fixed pairing PIN, entered on the controller when it pairs.
pub const PERIPHERAL_PASSKEY: u32 = 123_456;

/// Pairing requirements handed to the security manager at bring-up.
pub const AUTH_REQUIREMENTS: AuthRequirements = AuthRequirements {
    bonding: false,
    mitm_protection: false,
    secure_connections: false,
    keypress_notifications: false,
    min_key_size: 7,
    max_key_size: 16,
    fixed_pin: Some(PERIPHERAL_PASSKEY),
    random_identity_address: false,
};

/// Authentication requirements of the pairing procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuthRequirements {
    pub bonding: bool,
    pub mitm_protection: bool,
    pub secure_connections: bool,
    pub keypress_notifications: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
    /// `Some(pin)` pairs with a pre-shared PIN instead of a generated one.
    pub fixed_pin: Option<u32>,
    pub random_identity_address: bool,
}

// Radio

/// Enable the coprocessor's high-power PA.
pub const TX_HIGH_POWER: bool = true;

/// PA level (0..=7). High power + level 4 is about -2 dBm on BlueNRG-2.
pub const TX_PA_LEVEL: u8 = 4;

/// TX power hint placed in the advertising data (dBm).
pub const ADV_TX_POWER_DBM: i8 = 0;

/// Advertising interval range (in 0.625 ms units). 0x0800 = 1.28 s.
pub const ADV_INTERVAL_MIN: u16 = 0x0800;
pub const ADV_INTERVAL_MAX: u16 = 0x0900;

/// Time the BlueNRG-2 needs after a reset before accepting commands (ms).
pub const COPROCESSOR_BOOT_MS: u32 = 2000;

/// Upper bound on the wait for a command to complete (ms).
pub const COMMAND_TIMEOUT_MS: u32 = 1000;

// Actuators

/// Duty range shared by the two channels of the paired PWM instance.
pub const PAIRED_MAX_DUTY: u16 = 24;

/// Duty range of the third actuator.
pub const THIRD_MAX_DUTY: u16 = 24;

/// Duty range of the fourth actuator.
pub const FOURTH_MAX_DUTY: u16 = 24;

/// Slot → PWM channel map. Slots 0 and 1 run off the same PWM counter,
/// so they must share a range.
pub const ACTUATOR_CHANNELS: [ActuatorChannel; GRID_SLOTS] = [
    ActuatorChannel::new(PwmChannel::new(PwmInstance::Pwm0, 0), PAIRED_MAX_DUTY),
    ActuatorChannel::new(PwmChannel::new(PwmInstance::Pwm0, 1), PAIRED_MAX_DUTY),
    ActuatorChannel::new(PwmChannel::new(PwmInstance::Pwm1, 0), THIRD_MAX_DUTY),
    ActuatorChannel::new(PwmChannel::new(PwmInstance::Pwm2, 0), FOURTH_MAX_DUTY),
];

// Timing

/// Housekeeping tick period (ms).
pub const TICK_INTERVAL_MS: u64 = 100;

/// Fixed settle delay after every actuation update (ms).
pub const ACTUATION_SETTLE_MS: u64 = 10;

/// Push the applied grid back to the controller while paired.
pub const TELEMETRY_ENABLED: bool = true;

/// Minimum spacing between two telemetry updates (ms).
pub const TELEMETRY_INTERVAL_MS: u64 = 1000;

// Queues

/// Inbound HCI events buffered between the radio and glove tasks.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Outbound transport requests buffered between the glove and radio tasks.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// Indicator commands buffered for the LED task.
pub const INDICATOR_QUEUE_DEPTH: usize = 4;

// GPIO pin assignments (nRF52840-DK + X-NUCLEO-BNRG2A1 wiring)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   BlueNRG SCK    → P0.19
//   BlueNRG MOSI   → P0.20
//   BlueNRG MISO   → P0.21
//   BlueNRG CS     → P0.22
//   BlueNRG IRQ    → P0.23
//   BlueNRG RESET  → P0.24
//   Actuator 0     → P0.02 (PWM0 ch0)
//   Actuator 1     → P0.03 (PWM0 ch1)
//   Actuator 2     → P0.28 (PWM1 ch0)
//   Actuator 3     → P0.29 (PWM2 ch0)
//   Fault LED      → P0.13
//   Status LED     → P0.14

/// The DK LEDs are wired active-low.
pub const LED_ACTIVE_LOW: bool = true;
