//! Host-testable core of the haptic glove firmware.
//!
//! Everything that does not touch hardware lives here: the Grid codec,
//! the session state machine, the actuation mapper, HCI framing and the
//! event dispatcher. The embedded binary (`main.rs`, `embedded` feature)
//! wires these to the BlueNRG-2 coprocessor and the PWM peripherals.
//!
//! Usage: `cargo test --lib` or `cargo test`
//!
//! Note: The library does no logging of its own. It returns typed
//! outcomes ([`dispatch::Reaction`], [`actuation::ActuationReport`],
//! [`error::Error`]) and the binary logs them with defmt.

#![cfg_attr(not(test), no_std)]

// ═══════════════════════════════════════════════════════════════════════════
// Wire formats
// ═══════════════════════════════════════════════════════════════════════════

pub mod adv;
pub mod codec;
pub mod gatt;
pub mod hci;

// ═══════════════════════════════════════════════════════════════════════════
// Application logic
// ═══════════════════════════════════════════════════════════════════════════

pub mod actuation;
pub mod address;
pub mod dispatch;
pub mod session;
pub mod startup;

// ═══════════════════════════════════════════════════════════════════════════
// Boundaries
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod transport;

pub use codec::GridCommand;
pub use dispatch::{Glove, Reaction};
pub use error::Error;
pub use session::SessionState;
