//! BLE session state machine.
//!
//! ```text
//! Idle ──tick──▶ Advertising ──conn ok──▶ Connected ──tick──▶ PairingRequested
//!                    ▲                                              │
//!                    └────────────── disconnection ◀── Paired ◀─────┘
//!                                                    pairing ok
//! ```
//!
//! Disconnection from any state returns to `Advertising` and re-arms the
//! discoverable request for the next tick. The pairing request is sent
//! once per connection. A failed pairing leaves the state unchanged; the
//! peer has to reconnect.

use crate::error::Error;

/// Where the session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Idle,
    Advertising,
    Connected,
    PairingRequested,
    Paired,
}

/// The connected peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerIdentity {
    /// Peer address, little-endian.
    pub address: [u8; 6],
    pub connection: u16,
}

/// Inputs that move the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    ConnectionComplete { status: u8, connection: u16, peer: [u8; 6] },
    Disconnection { connection: u16, reason: u8 },
    PairingComplete { connection: u16, status: u8, reason: u8 },
    PasskeyRequest { connection: u16 },
    Tick,
}

/// What the session wants done in response to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionAction {
    SetDiscoverable,
    RequestPairing { connection: u16 },
    RespondPasskey { connection: u16, passkey: u32 },
    /// Paired tick: telemetry may be pushed if the caller's gates allow.
    PushTelemetry { connection: u16 },
    Fault(Error),
}

pub struct Session {
    state: SessionState,
    peer: Option<PeerIdentity>,
    discoverable_pending: bool,
    passkey: u32,
}

impl Session {
    pub const fn new(passkey: u32) -> Self {
        Self {
            state: SessionState::Idle,
            peer: None,
            discoverable_pending: true,
            passkey,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Feed one event and return at most one follow-up action.
    pub fn handle(&mut self, event: SessionEvent) -> Option<SessionAction> {
        match event {
            SessionEvent::ConnectionComplete { status, connection, peer } => {
                if status != 0 {
                    return None;
                }
                self.state = SessionState::Connected;
                self.peer = Some(PeerIdentity { address: peer, connection });
                self.discoverable_pending = false;
                None
            }
            SessionEvent::Disconnection { .. } => {
                self.peer = None;
                self.state = SessionState::Advertising;
                self.discoverable_pending = true;
                None
            }
            SessionEvent::PairingComplete { connection, status, reason } => {
                if !self.is_current(connection) {
                    return None;
                }
                if status != 0 {
                    return Some(SessionAction::Fault(Error::PairingFailed { status, reason }));
                }
                if self.state == SessionState::PairingRequested {
                    self.state = SessionState::Paired;
                }
                None
            }
            SessionEvent::PasskeyRequest { connection } => Some(SessionAction::RespondPasskey {
                connection,
                passkey: self.passkey,
            }),
            SessionEvent::Tick => self.tick(),
        }
    }

    fn tick(&mut self) -> Option<SessionAction> {
        match self.state {
            SessionState::Idle | SessionState::Advertising => {
                if !self.discoverable_pending {
                    return None;
                }
                self.discoverable_pending = false;
                self.state = SessionState::Advertising;
                Some(SessionAction::SetDiscoverable)
            }
            SessionState::Connected => {
                let connection = self.peer?.connection;
                self.state = SessionState::PairingRequested;
                Some(SessionAction::RequestPairing { connection })
            }
            SessionState::PairingRequested => None,
            SessionState::Paired => {
                let connection = self.peer?.connection;
                Some(SessionAction::PushTelemetry { connection })
            }
        }
    }

    fn is_current(&self, connection: u16) -> bool {
        self.peer.map_or(false, |p| p.connection == connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: [u8; 6] = [1, 2, 3, 4, 5, 6];
    const CONN: u16 = 0x0801;

    fn connected() -> Session {
        let mut s = Session::new(123_456);
        s.handle(SessionEvent::Tick);
        s.handle(SessionEvent::ConnectionComplete { status: 0, connection: CONN, peer: PEER });
        s
    }

    fn all_states() -> [Session; 5] {
        let idle = Session::new(1);
        let mut advertising = Session::new(1);
        advertising.handle(SessionEvent::Tick);
        let c = connected();
        let mut requested = connected();
        requested.handle(SessionEvent::Tick);
        let mut paired = connected();
        paired.handle(SessionEvent::Tick);
        paired.handle(SessionEvent::PairingComplete { connection: CONN, status: 0, reason: 0 });
        [idle, advertising, c, requested, paired]
    }

    #[test]
    fn first_tick_starts_advertising_once() {
        let mut s = Session::new(1);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.handle(SessionEvent::Tick), Some(SessionAction::SetDiscoverable));
        assert_eq!(s.state(), SessionState::Advertising);
        assert_eq!(s.handle(SessionEvent::Tick), None);
    }

    #[test]
    fn paired_is_reachable() {
        let mut s = connected();
        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(s.peer(), Some(&PeerIdentity { address: PEER, connection: CONN }));

        assert_eq!(
            s.handle(SessionEvent::Tick),
            Some(SessionAction::RequestPairing { connection: CONN })
        );
        assert_eq!(s.state(), SessionState::PairingRequested);

        s.handle(SessionEvent::PairingComplete { connection: CONN, status: 0, reason: 0 });
        assert_eq!(s.state(), SessionState::Paired);
        assert_eq!(
            s.handle(SessionEvent::Tick),
            Some(SessionAction::PushTelemetry { connection: CONN })
        );
    }

    #[test]
    fn pairing_request_is_one_shot() {
        let mut s = connected();
        assert!(matches!(s.handle(SessionEvent::Tick), Some(SessionAction::RequestPairing { .. })));
        for _ in 0..5 {
            assert_eq!(s.handle(SessionEvent::Tick), None);
        }
    }

    #[test]
    fn disconnection_from_every_state_returns_to_advertising() {
        for mut s in all_states() {
            s.handle(SessionEvent::Disconnection { connection: CONN, reason: 0x13 });
            assert_eq!(s.state(), SessionState::Advertising);
            assert!(s.peer().is_none());
            assert_eq!(s.handle(SessionEvent::Tick), Some(SessionAction::SetDiscoverable));
            assert_eq!(s.handle(SessionEvent::Tick), None);
        }
    }

    #[test]
    fn failed_connection_changes_nothing() {
        let mut s = Session::new(1);
        s.handle(SessionEvent::Tick);
        s.handle(SessionEvent::ConnectionComplete { status: 0x3E, connection: CONN, peer: PEER });
        assert_eq!(s.state(), SessionState::Advertising);
        assert!(s.peer().is_none());
    }

    #[test]
    fn failed_pairing_is_a_fault_without_state_change() {
        let mut s = connected();
        s.handle(SessionEvent::Tick);
        let action =
            s.handle(SessionEvent::PairingComplete { connection: CONN, status: 0x02, reason: 0x05 });
        assert_eq!(
            action,
            Some(SessionAction::Fault(Error::PairingFailed { status: 0x02, reason: 0x05 }))
        );
        assert_eq!(s.state(), SessionState::PairingRequested);
        assert_eq!(s.handle(SessionEvent::Tick), None);
    }

    #[test]
    fn pairing_outcome_for_another_link_is_ignored() {
        let mut s = connected();
        s.handle(SessionEvent::Tick);
        assert_eq!(
            s.handle(SessionEvent::PairingComplete { connection: 0x0999, status: 0, reason: 0 }),
            None
        );
        assert_eq!(s.state(), SessionState::PairingRequested);
    }

    #[test]
    fn passkey_request_gets_fixed_passkey() {
        let mut s = connected();
        assert_eq!(
            s.handle(SessionEvent::PasskeyRequest { connection: CONN }),
            Some(SessionAction::RespondPasskey { connection: CONN, passkey: 123_456 })
        );
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[test]
    fn reconnect_rearms_pairing_request() {
        let mut s = connected();
        s.handle(SessionEvent::Tick);
        s.handle(SessionEvent::Disconnection { connection: CONN, reason: 0x08 });
        s.handle(SessionEvent::Tick);
        s.handle(SessionEvent::ConnectionComplete { status: 0, connection: 0x0802, peer: PEER });
        assert_eq!(
            s.handle(SessionEvent::Tick),
            Some(SessionAction::RequestPairing { connection: 0x0802 })
        );
    }
}
