//! Event dispatcher and the glove core it feeds.
//!
//! Each inbound event is resolved through a static table for its kind
//! (LE meta, vendor, generic) keyed by sub-code. Unknown codes are
//! ignored. [`Glove`] owns the session and the actuation mapper and turns
//! every routed event into a [`Reaction`] for the radio owner.

use crate::actuation::{ActuationMapper, ActuationReport, ActuatorDriver};
use crate::address::DeviceAddress;
use crate::adv::AdvertisingPayload;
use crate::codec::{self, GridCommand};
use crate::config;
use crate::error::Error;
use crate::gatt::{GattHandles, CCCD_NOTIFY};
use crate::hci::event::{
    AttributeModified, ConnectionComplete, Disconnection, EventKind, PairingComplete,
    PasskeyRequest, RawEvent, ReadPermitRequest, ACI_GAP_PAIRING_COMPLETE, ACI_GAP_PASS_KEY_REQ,
    ACI_GATT_ATTRIBUTE_MODIFIED, ACI_GATT_READ_PERMIT_REQ, EVT_DISCONNECTION_COMPLETE,
    LE_CONNECTION_COMPLETE, LE_ENHANCED_CONNECTION_COMPLETE,
};
use crate::session::{Session, SessionAction, SessionEvent};
use crate::transport::Request;

/// Handler selected for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    ConnectionComplete,
    EnhancedConnectionComplete,
    Disconnection,
    PairingComplete,
    PasskeyRequest,
    AttributeModified,
    ReadPermit,
}

const LE_META_ROUTES: &[(u16, Route)] = &[
    (LE_CONNECTION_COMPLETE, Route::ConnectionComplete),
    (LE_ENHANCED_CONNECTION_COMPLETE, Route::EnhancedConnectionComplete),
];

const VENDOR_ROUTES: &[(u16, Route)] = &[
    (ACI_GAP_PAIRING_COMPLETE, Route::PairingComplete),
    (ACI_GAP_PASS_KEY_REQ, Route::PasskeyRequest),
    (ACI_GATT_ATTRIBUTE_MODIFIED, Route::AttributeModified),
    (ACI_GATT_READ_PERMIT_REQ, Route::ReadPermit),
];

const GENERIC_ROUTES: &[(u16, Route)] = &[(EVT_DISCONNECTION_COMPLETE as u16, Route::Disconnection)];

/// Look up the handler for `event`, if any.
pub fn route(event: &RawEvent<'_>) -> Option<Route> {
    let table = match event.kind {
        EventKind::LeMeta => LE_META_ROUTES,
        EventKind::Vendor => VENDOR_ROUTES,
        EventKind::Generic => GENERIC_ROUTES,
    };
    table
        .iter()
        .find(|(code, _)| *code == event.code)
        .map(|&(_, route)| route)
}

/// Outcome of one event or tick.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reaction {
    /// No handler for this event.
    Ignored,
    /// State was updated; nothing else to do.
    Handled,
    /// The radio owner should execute this request.
    Request(Request),
    /// Actuators were updated.
    Actuated(ActuationReport),
    /// The peer failed to connect (status from the controller).
    ConnectionFailed(u8),
    /// Input was discarded.
    Dropped(Error),
    /// Recoverable protocol fault.
    Fault(Error),
}

/// The glove: session state, actuators and GATT handles behind one owner.
pub struct Glove<D> {
    session: Session,
    mapper: ActuationMapper<D>,
    handles: GattHandles,
    advertising: AdvertisingPayload,
    notifications: bool,
    last_telemetry_ms: Option<u64>,
}

impl<D: ActuatorDriver> Glove<D> {
    pub fn new(driver: D, address: DeviceAddress, handles: GattHandles) -> Self {
        Self {
            session: Session::new(config::PERIPHERAL_PASSKEY),
            mapper: ActuationMapper::new(driver, config::ACTUATOR_CHANNELS),
            handles,
            advertising: AdvertisingPayload::new(
                config::DEVICE_NAME,
                config::ADV_TX_POWER_DBM,
                &address,
            ),
            notifications: false,
            last_telemetry_ms: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn mapper(&self) -> &ActuationMapper<D> {
        &self.mapper
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications
    }

    /// Drive every actuator off.
    pub fn all_off(&mut self) -> ActuationReport {
        self.mapper.all_off()
    }

    /// Parse and dispatch one HCI event packet.
    pub fn on_packet(&mut self, packet: &[u8]) -> Reaction {
        match RawEvent::parse(packet) {
            Ok(event) => self.on_event(&event),
            Err(_) => Reaction::Dropped(Error::MalformedEvent),
        }
    }

    /// Dispatch one event record.
    pub fn on_event(&mut self, event: &RawEvent<'_>) -> Reaction {
        let Some(route) = route(event) else {
            return Reaction::Ignored;
        };
        let params = event.params;
        let reaction = match route {
            Route::ConnectionComplete => {
                ConnectionComplete::parse(params).map(|c| self.on_connection(c))
            }
            Route::EnhancedConnectionComplete => {
                ConnectionComplete::parse_enhanced(params).map(|c| self.on_connection(c))
            }
            Route::Disconnection => Disconnection::parse(params).map(|d| self.on_disconnection(d)),
            Route::PairingComplete => PairingComplete::parse(params).map(|p| {
                self.session_event(SessionEvent::PairingComplete {
                    connection: p.connection,
                    status: p.status,
                    reason: p.reason,
                })
            }),
            Route::PasskeyRequest => PasskeyRequest::parse(params).map(|p| {
                self.session_event(SessionEvent::PasskeyRequest { connection: p.connection })
            }),
            Route::AttributeModified => AttributeModified::parse(params).map(|w| self.on_write(&w)),
            Route::ReadPermit => ReadPermitRequest::parse(params).map(|r| self.on_read_permit(r)),
        };
        reaction.unwrap_or(Reaction::Dropped(Error::MalformedEvent))
    }

    /// Housekeeping tick at uptime `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Reaction {
        match self.session.handle(SessionEvent::Tick) {
            Some(SessionAction::PushTelemetry { .. }) => self.telemetry(now_ms),
            Some(action) => self.session_action(action),
            None => Reaction::Handled,
        }
    }

    fn on_connection(&mut self, conn: ConnectionComplete) -> Reaction {
        if conn.status != 0 {
            return Reaction::ConnectionFailed(conn.status);
        }
        self.notifications = false;
        self.last_telemetry_ms = None;
        self.session_event(SessionEvent::ConnectionComplete {
            status: conn.status,
            connection: conn.connection,
            peer: conn.peer_address,
        })
    }

    fn on_disconnection(&mut self, d: Disconnection) -> Reaction {
        self.session.handle(SessionEvent::Disconnection {
            connection: d.connection,
            reason: d.reason,
        });
        self.notifications = false;
        self.last_telemetry_ms = None;
        Reaction::Actuated(self.mapper.all_off())
    }

    fn on_write(&mut self, write: &AttributeModified<'_>) -> Reaction {
        if write.attribute == self.handles.grid_value() {
            if write.offset != 0 {
                return Reaction::Dropped(Error::UnexpectedOffset(write.offset));
            }
            return match codec::decode(write.data) {
                Ok(command) => Reaction::Actuated(self.mapper.apply(&command)),
                Err(e) => Reaction::Dropped(e.into()),
            };
        }
        if write.attribute == self.handles.grid_cccd() {
            let [lo, hi, ..] = *write.data else {
                return Reaction::Dropped(Error::MalformedEvent);
            };
            self.notifications = u16::from_le_bytes([lo, hi]) & CCCD_NOTIFY != 0;
            return Reaction::Handled;
        }
        Reaction::Ignored
    }

    fn on_read_permit(&mut self, read: ReadPermitRequest) -> Reaction {
        if !self.session.is_connected() {
            return Reaction::Ignored;
        }
        Reaction::Request(Request::AllowRead { connection: read.connection })
    }

    fn session_event(&mut self, event: SessionEvent) -> Reaction {
        match self.session.handle(event) {
            Some(action) => self.session_action(action),
            None => Reaction::Handled,
        }
    }

    fn session_action(&mut self, action: SessionAction) -> Reaction {
        match action {
            SessionAction::SetDiscoverable => {
                Reaction::Request(Request::SetDiscoverable(self.advertising.clone()))
            }
            SessionAction::RequestPairing { connection } => {
                Reaction::Request(Request::RequestPairing { connection })
            }
            SessionAction::RespondPasskey { connection, passkey } => {
                Reaction::Request(Request::RespondPasskey { connection, passkey })
            }
            SessionAction::PushTelemetry { .. } => Reaction::Handled,
            SessionAction::Fault(e) => Reaction::Fault(e),
        }
    }

    fn telemetry(&mut self, now_ms: u64) -> Reaction {
        if !config::TELEMETRY_ENABLED || !self.notifications {
            return Reaction::Handled;
        }
        if let Some(last) = self.last_telemetry_ms {
            if now_ms.saturating_sub(last) < config::TELEMETRY_INTERVAL_MS {
                return Reaction::Handled;
            }
        }
        self.last_telemetry_ms = Some(now_ms);
        let values = self.mapper.last_applied().values;
        let frame = codec::encode(&GridCommand::new(codec::telemetry_tag(now_ms), values));
        Reaction::Request(Request::UpdateGrid {
            service: self.handles.service,
            characteristic: self.handles.grid,
            frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::PwmChannel;
    use crate::session::SessionState;

    struct Duties(std::vec::Vec<u16>);

    impl ActuatorDriver for Duties {
        type Error = ();

        fn set_duty(&mut self, _: PwmChannel, duty: u16) -> Result<(), ()> {
            self.0.push(duty);
            Ok(())
        }
    }

    const HANDLES: GattHandles = GattHandles { service: 0x000C, grid: 0x000D };
    const CONN: u16 = 0x0801;

    fn glove() -> Glove<Duties> {
        let address = DeviceAddress::from_config_bytes([1, 2, 3, 4, 5, 0xC6]).unwrap();
        Glove::new(Duties(std::vec::Vec::new()), address, HANDLES)
    }

    fn event(evt: u8, params: &[u8]) -> std::vec::Vec<u8> {
        let mut p = std::vec![0x04, evt, params.len() as u8];
        p.extend_from_slice(params);
        p
    }

    fn vendor(code: u16, params: &[u8]) -> std::vec::Vec<u8> {
        let mut body = code.to_le_bytes().to_vec();
        body.extend_from_slice(params);
        event(0xFF, &body)
    }

    fn connect() -> std::vec::Vec<u8> {
        let mut params = std::vec![0x01, 0x00];
        params.extend_from_slice(&CONN.to_le_bytes());
        params.extend_from_slice(&[0x01, 0x00, 1, 2, 3, 4, 5, 6, 0x28, 0, 0, 0, 0xF4, 1, 0]);
        event(0x3E, &params)
    }

    fn write(attribute: u16, offset: u16, data: &[u8]) -> std::vec::Vec<u8> {
        let mut params = CONN.to_le_bytes().to_vec();
        params.extend_from_slice(&attribute.to_le_bytes());
        params.extend_from_slice(&offset.to_le_bytes());
        params.extend_from_slice(&(data.len() as u16).to_le_bytes());
        params.extend_from_slice(data);
        vendor(ACI_GATT_ATTRIBUTE_MODIFIED, &params)
    }

    fn paired() -> Glove<Duties> {
        let mut g = glove();
        g.tick(0);
        g.on_packet(&connect());
        g.tick(100);
        g.on_packet(&vendor(ACI_GAP_PAIRING_COMPLETE, &[0x01, 0x08, 0x00, 0x00]));
        assert_eq!(g.session().state(), SessionState::Paired);
        g
    }

    #[test]
    fn routes_are_looked_up_per_kind() {
        let raw = RawEvent { kind: EventKind::Vendor, code: 0x0C01, params: &[] };
        assert_eq!(route(&raw), Some(Route::AttributeModified));
        let raw = RawEvent { kind: EventKind::Generic, code: 0x0C01, params: &[] };
        assert_eq!(route(&raw), None);
        let raw = RawEvent { kind: EventKind::LeMeta, code: 0x0A, params: &[] };
        assert_eq!(route(&raw), Some(Route::EnhancedConnectionComplete));
        let raw = RawEvent { kind: EventKind::LeMeta, code: 0x03, params: &[] };
        assert_eq!(route(&raw), None);
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut g = glove();
        assert_eq!(g.on_packet(&event(0x08, &[0, 1, 8, 1])), Reaction::Ignored);
        assert_eq!(g.on_packet(&vendor(0x0C0F, &[])), Reaction::Ignored);
    }

    #[test]
    fn first_tick_requests_discoverable() {
        let mut g = glove();
        match g.tick(0) {
            Reaction::Request(Request::SetDiscoverable(payload)) => {
                assert_eq!(payload.local_name.as_slice(), b"\x09Haptic ");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(g.tick(100), Reaction::Handled);
    }

    #[test]
    fn grid_write_actuates() {
        let mut g = glove();
        let frame = codec::encode(&GridCommand::new(1, [0.0, 1.0, 0.0, 0.0]));
        match g.on_packet(&write(HANDLES.grid_value(), 0, &frame)) {
            Reaction::Actuated(report) => assert_eq!(report.duties, [0, 24, 0, 0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_or_offset_writes_are_dropped() {
        let mut g = glove();
        assert_eq!(
            g.on_packet(&write(HANDLES.grid_value(), 0, &[0u8; 10])),
            Reaction::Dropped(Error::Decode(codec::DecodeError::TooShort { len: 10 }))
        );
        assert_eq!(
            g.on_packet(&write(HANDLES.grid_value(), 2, &[0u8; 18])),
            Reaction::Dropped(Error::UnexpectedOffset(2))
        );
        assert!(g.mapper().driver().0.is_empty());
    }

    #[test]
    fn writes_to_other_handles_are_ignored() {
        let mut g = glove();
        assert_eq!(g.on_packet(&write(0x0020, 0, &[0u8; 18])), Reaction::Ignored);
    }

    #[test]
    fn truncated_known_event_is_dropped() {
        let mut g = glove();
        assert_eq!(
            g.on_packet(&vendor(ACI_GAP_PASS_KEY_REQ, &[0x01])),
            Reaction::Dropped(Error::MalformedEvent)
        );
        assert_eq!(g.on_packet(&[0x04, 0x05]), Reaction::Dropped(Error::MalformedEvent));
    }

    #[test]
    fn passkey_request_is_answered() {
        let mut g = glove();
        assert_eq!(
            g.on_packet(&vendor(ACI_GAP_PASS_KEY_REQ, &CONN.to_le_bytes())),
            Reaction::Request(Request::RespondPasskey { connection: CONN, passkey: 123_456 })
        );
    }

    #[test]
    fn disconnection_turns_actuators_off() {
        let mut g = paired();
        let frame = codec::encode(&GridCommand::new(1, [1.0; 4]));
        g.on_packet(&write(HANDLES.grid_value(), 0, &frame));

        let reaction = g.on_packet(&event(0x05, &[0x00, 0x01, 0x08, 0x13]));
        assert_eq!(
            reaction,
            Reaction::Actuated(ActuationReport { duties: [0; 4], failed: 0 })
        );
        assert_eq!(g.session().state(), SessionState::Advertising);
        assert!(matches!(g.tick(200), Reaction::Request(Request::SetDiscoverable(_))));
    }

    #[test]
    fn telemetry_needs_notifications_and_respects_interval() {
        let mut g = paired();
        assert_eq!(g.tick(1_000), Reaction::Handled);

        let reaction = g.on_packet(&write(HANDLES.grid_cccd(), 0, &[0x01, 0x00]));
        assert_eq!(reaction, Reaction::Handled);
        assert!(g.notifications_enabled());

        let frame = codec::encode(&GridCommand::new(5, [0.5, f32::NAN, 2.0, 0.0]));
        g.on_packet(&write(HANDLES.grid_value(), 0, &frame));

        match g.tick(1_600) {
            Reaction::Request(Request::UpdateGrid { service, characteristic, frame }) => {
                assert_eq!(service, HANDLES.service);
                assert_eq!(characteristic, HANDLES.grid);
                let sent = codec::decode(&frame).unwrap();
                assert_eq!(sent.timestamp, 200);
                assert_eq!(sent.values, [0.5, 0.0, 1.0, 0.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(g.tick(2_000), Reaction::Handled);
        assert!(matches!(g.tick(2_600), Reaction::Request(Request::UpdateGrid { .. })));
    }

    #[test]
    fn read_permit_is_allowed_only_while_connected() {
        let read = vendor(ACI_GATT_READ_PERMIT_REQ, &[0x01, 0x08, 0x0E, 0x00, 0x00, 0x00]);
        let mut g = glove();
        assert_eq!(g.on_packet(&read), Reaction::Ignored);
        g.on_packet(&connect());
        assert_eq!(
            g.on_packet(&read),
            Reaction::Request(Request::AllowRead { connection: CONN })
        );
    }

    #[test]
    fn failed_connection_is_reported() {
        let mut g = glove();
        g.tick(0);
        let mut packet = connect();
        packet[4] = 0x3E;
        assert_eq!(g.on_packet(&packet), Reaction::ConnectionFailed(0x3E));
        assert_eq!(g.session().state(), SessionState::Advertising);
    }
}
