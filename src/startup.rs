//! Coprocessor bring-up.
//!
//! Runs once before the event loop. Any failure that leaves the glove
//! without an address, a GAP/GATT layer or the Grid service is fatal;
//! the caller parks with the fault indicator on.

use crate::address::DeviceAddress;
use crate::config;
use crate::error::Error;
use crate::gatt::{
    GapHandles, GattHandles, GRID_CHARACTERISTIC, GRID_SERVICE_MAX_ATTRIBUTES, GRID_SERVICE_UUID,
};
use crate::transport::{FirmwareVersion, Stack, TransportError};

/// Result of a successful bring-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BringUp {
    pub address: DeviceAddress,
    /// `None` if the version query failed (not fatal).
    pub version: Option<FirmwareVersion>,
    pub gap: GapHandles,
    pub handles: GattHandles,
    /// Non-fatal setup steps that were rejected.
    pub warnings: Warnings,
}

/// Non-fatal bring-up failures, kept for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Warnings {
    pub public_address: Option<TransportError>,
    pub tx_power: Option<TransportError>,
    pub device_name: Option<TransportError>,
}

impl Warnings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reset the coprocessor and register the glove's GAP, security and GATT
/// configuration.
pub fn bring_up<S: Stack + ?Sized>(stack: &mut S) -> Result<BringUp, Error> {
    let mut warnings = Warnings::default();

    stack.reset().map_err(Error::StackInit)?;
    let version = stack.version().ok();

    let raw = stack.read_local_address().map_err(Error::AddressUnavailable)?;
    let address = DeviceAddress::from_config_bytes(raw)?;

    warnings.public_address = stack.set_public_address(address.bytes()).err();
    warnings.tx_power = stack
        .set_tx_power(config::TX_HIGH_POWER, config::TX_PA_LEVEL)
        .err();

    stack.init_gatt().map_err(Error::StackInit)?;
    let gap = stack.init_gap(config::DEVICE_NAME_LEN).map_err(Error::StackInit)?;

    let name = config::DEVICE_NAME.as_bytes();
    warnings.device_name = stack
        .write_characteristic(gap.service, gap.device_name, 0, name)
        .err();

    stack
        .set_authentication(&config::AUTH_REQUIREMENTS)
        .map_err(Error::StackInit)?;

    let service = stack
        .add_service(&GRID_SERVICE_UUID, GRID_SERVICE_MAX_ATTRIBUTES)
        .map_err(Error::ServiceRegistration)?;
    let grid = stack
        .add_characteristic(service, &GRID_CHARACTERISTIC)
        .map_err(Error::ServiceRegistration)?;

    Ok(BringUp {
        address,
        version,
        gap,
        handles: GattHandles { service, grid },
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adv::AdvertisingPayload;
    use crate::config::AuthRequirements;
    use crate::gatt::CharacteristicParams;
    use crate::transport::Transport;

    struct MockStack {
        address: Result<[u8; 6], TransportError>,
        fail_tx_power: bool,
        fail_service: bool,
        calls: std::vec::Vec<&'static str>,
        name_written: std::vec::Vec<u8>,
    }

    impl MockStack {
        fn new() -> Self {
            Self {
                address: Ok([0x11, 0x22, 0x33, 0x44, 0x55, 0xE6]),
                fail_tx_power: false,
                fail_service: false,
                calls: std::vec::Vec::new(),
                name_written: std::vec::Vec::new(),
            }
        }
    }

    impl Transport for MockStack {
        fn read_local_address(&mut self) -> Result<[u8; 6], TransportError> {
            self.calls.push("address");
            self.address
        }
        fn send_advertising_payload(&mut self, _: &AdvertisingPayload) -> Result<(), TransportError> {
            Ok(())
        }
        fn request_pairing(&mut self, _: u16) -> Result<(), TransportError> {
            Ok(())
        }
        fn respond_passkey(&mut self, _: u16, _: u32) -> Result<(), TransportError> {
            Ok(())
        }
        fn write_characteristic(&mut self, _: u16, _: u16, _: u8, value: &[u8]) -> Result<(), TransportError> {
            self.calls.push("name");
            self.name_written = value.to_vec();
            Ok(())
        }
        fn allow_read(&mut self, _: u16) -> Result<(), TransportError> {
            Ok(())
        }
    }

    impl Stack for MockStack {
        fn reset(&mut self) -> Result<(), TransportError> {
            self.calls.push("reset");
            Ok(())
        }
        fn version(&mut self) -> Result<FirmwareVersion, TransportError> {
            Err(TransportError::Timeout)
        }
        fn set_public_address(&mut self, _: [u8; 6]) -> Result<(), TransportError> {
            Ok(())
        }
        fn set_tx_power(&mut self, _: bool, _: u8) -> Result<(), TransportError> {
            if self.fail_tx_power {
                return Err(TransportError::Status(0x12));
            }
            Ok(())
        }
        fn init_gatt(&mut self) -> Result<(), TransportError> {
            self.calls.push("gatt");
            Ok(())
        }
        fn init_gap(&mut self, _: u8) -> Result<GapHandles, TransportError> {
            self.calls.push("gap");
            Ok(GapHandles { service: 0x0005, device_name: 0x0006, appearance: 0x0008 })
        }
        fn set_authentication(&mut self, _: &AuthRequirements) -> Result<(), TransportError> {
            self.calls.push("auth");
            Ok(())
        }
        fn add_service(&mut self, _: &[u8; 16], _: u8) -> Result<u16, TransportError> {
            self.calls.push("service");
            if self.fail_service {
                return Err(TransportError::Status(0x1F));
            }
            Ok(0x000C)
        }
        fn add_characteristic(&mut self, _: u16, _: &CharacteristicParams) -> Result<u16, TransportError> {
            self.calls.push("char");
            Ok(0x000D)
        }
    }

    #[test]
    fn full_bring_up_in_order() {
        let mut stack = MockStack::new();
        let up = bring_up(&mut stack).unwrap();
        assert_eq!(
            stack.calls,
            ["reset", "address", "gatt", "gap", "name", "auth", "service", "char"]
        );
        assert_eq!(stack.name_written, b"Haptic ");
        assert_eq!(up.handles, GattHandles { service: 0x000C, grid: 0x000D });
        assert_eq!(up.version, None);
        assert!(up.warnings.is_empty());
    }

    #[test]
    fn missing_address_is_fatal() {
        let mut stack = MockStack::new();
        stack.address = Err(TransportError::Bus);
        let err = bring_up(&mut stack).unwrap_err();
        assert_eq!(err, Error::AddressUnavailable(TransportError::Bus));
        assert!(err.is_fatal());
        assert!(!stack.calls.contains(&"gatt"));
    }

    #[test]
    fn malformed_address_is_fatal() {
        let mut stack = MockStack::new();
        stack.address = Ok([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(bring_up(&mut stack).unwrap_err(), Error::MalformedAddress);
    }

    #[test]
    fn tx_power_failure_is_a_warning() {
        let mut stack = MockStack::new();
        stack.fail_tx_power = true;
        let up = bring_up(&mut stack).unwrap();
        assert_eq!(up.warnings.tx_power, Some(TransportError::Status(0x12)));
    }

    #[test]
    fn service_failure_is_fatal() {
        let mut stack = MockStack::new();
        stack.fail_service = true;
        let err = bring_up(&mut stack).unwrap_err();
        assert_eq!(err, Error::ServiceRegistration(TransportError::Status(0x1F)));
        assert!(!stack.calls.contains(&"char"));
    }
}
