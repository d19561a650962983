//! Integration tests for the haptic glove host-testable logic.
//!
//! Each test feeds raw HCI event packets through `Glove::on_packet`, the
//! same entry point the firmware uses, and checks the resulting requests
//! and actuator writes.

use haptic_glove::actuation::{ActuatorDriver, PwmChannel, PwmInstance};
use haptic_glove::address::DeviceAddress;
use haptic_glove::codec::{self, GridCommand, GRID_FRAME_LEN};
use haptic_glove::gatt::GattHandles;
use haptic_glove::transport::Request;
use haptic_glove::{Glove, Reaction, SessionState};

const HANDLES: GattHandles = GattHandles { service: 0x000C, grid: 0x000D };
const CONN: u16 = 0x0801;

const SCENARIO: [u8; GRID_FRAME_LEN] = [
    0x01, 0x00, // timestamp = 1
    0x00, 0x00, 0x00, 0x00, // 0.0
    0x00, 0x00, 0x80, 0x3F, // 1.0
    0x00, 0x00, 0x00, 0x00, // 0.0
    0x00, 0x00, 0x00, 0x00, // 0.0
];

#[derive(Default)]
struct Recorder {
    writes: Vec<(PwmChannel, u16)>,
}

impl ActuatorDriver for Recorder {
    type Error = ();

    fn set_duty(&mut self, channel: PwmChannel, duty: u16) -> Result<(), ()> {
        self.writes.push((channel, duty));
        Ok(())
    }
}

fn glove() -> Glove<Recorder> {
    let address = DeviceAddress::from_config_bytes([0x11, 0x22, 0x33, 0x44, 0x55, 0xE6])
        .expect("static random address");
    Glove::new(Recorder::default(), address, HANDLES)
}

fn packet(evt: u8, params: &[u8]) -> Vec<u8> {
    let mut p = vec![0x04, evt, params.len() as u8];
    p.extend_from_slice(params);
    p
}

fn vendor(code: u16, params: &[u8]) -> Vec<u8> {
    let mut body = code.to_le_bytes().to_vec();
    body.extend_from_slice(params);
    packet(0xFF, &body)
}

fn connection_complete() -> Vec<u8> {
    let mut params = vec![0x01, 0x00];
    params.extend_from_slice(&CONN.to_le_bytes());
    params.extend_from_slice(&[0x01, 0x00, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6]);
    params.extend_from_slice(&[0x28, 0x00, 0x00, 0x00, 0xF4, 0x01, 0x00]);
    packet(0x3E, &params)
}

fn disconnection() -> Vec<u8> {
    let mut params = vec![0x00];
    params.extend_from_slice(&CONN.to_le_bytes());
    params.push(0x13);
    packet(0x05, &params)
}

fn grid_write(data: &[u8]) -> Vec<u8> {
    let mut params = CONN.to_le_bytes().to_vec();
    params.extend_from_slice(&HANDLES.grid_value().to_le_bytes());
    params.extend_from_slice(&0u16.to_le_bytes());
    params.extend_from_slice(&(data.len() as u16).to_le_bytes());
    params.extend_from_slice(data);
    vendor(0x0C01, &params)
}

fn pairing_complete(status: u8) -> Vec<u8> {
    let mut params = CONN.to_le_bytes().to_vec();
    params.extend_from_slice(&[status, 0x00]);
    vendor(0x0401, &params)
}

#[test]
fn scenario_frame_drives_second_actuator() {
    let command = codec::decode(&SCENARIO).expect("18-byte frame");
    assert_eq!(command, GridCommand::new(1, [0.0, 1.0, 0.0, 0.0]));

    let mut g = glove();
    match g.on_packet(&grid_write(&SCENARIO)) {
        Reaction::Actuated(report) => {
            assert_eq!(report.duties, [0, 24, 0, 0]);
            assert!(report.is_complete());
        }
        other => panic!("expected actuation, got {other:?}"),
    }

    let writes = &g.mapper().driver().writes;
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[1], (PwmChannel::new(PwmInstance::Pwm0, 1), 24));
    assert!(writes.iter().enumerate().all(|(i, &(_, d))| i == 1 || d == 0));
}

#[test]
fn full_session_lifecycle() {
    let mut g = glove();
    assert_eq!(g.session().state(), SessionState::Idle);

    // Start-up: one discoverable request, then quiet.
    assert!(matches!(g.tick(0), Reaction::Request(Request::SetDiscoverable(_))));
    assert_eq!(g.tick(100), Reaction::Handled);
    assert_eq!(g.session().state(), SessionState::Advertising);

    // Connect, then a single pairing request.
    assert_eq!(g.on_packet(&connection_complete()), Reaction::Handled);
    assert_eq!(g.session().state(), SessionState::Connected);
    assert_eq!(
        g.tick(200),
        Reaction::Request(Request::RequestPairing { connection: CONN })
    );
    assert_eq!(g.tick(300), Reaction::Handled);
    assert_eq!(g.session().state(), SessionState::PairingRequested);

    // Passkey exchange and pairing.
    assert_eq!(
        g.on_packet(&vendor(0x0402, &CONN.to_le_bytes())),
        Reaction::Request(Request::RespondPasskey { connection: CONN, passkey: 123_456 })
    );
    assert_eq!(g.on_packet(&pairing_complete(0x00)), Reaction::Handled);
    assert_eq!(g.session().state(), SessionState::Paired);

    // Drive the actuators, then lose the link.
    g.on_packet(&grid_write(&codec::encode(&GridCommand::new(2, [1.0; 4]))));
    match g.on_packet(&disconnection()) {
        Reaction::Actuated(report) => assert_eq!(report.duties, [0; 4]),
        other => panic!("expected all-off, got {other:?}"),
    }
    assert_eq!(g.session().state(), SessionState::Advertising);
    assert!(g.session().peer().is_none());

    // Advertising is re-issued exactly once.
    assert!(matches!(g.tick(400), Reaction::Request(Request::SetDiscoverable(_))));
    assert_eq!(g.tick(500), Reaction::Handled);
}

#[test]
fn pairing_failure_is_reported_and_not_retried() {
    let mut g = glove();
    g.tick(0);
    g.on_packet(&connection_complete());
    g.tick(100);

    match g.on_packet(&pairing_complete(0x01)) {
        Reaction::Fault(e) => assert!(!e.is_fatal()),
        other => panic!("expected fault, got {other:?}"),
    }
    assert_eq!(g.session().state(), SessionState::PairingRequested);
    assert_eq!(g.tick(200), Reaction::Handled);
}

#[test]
fn nan_grid_never_reaches_hardware() {
    let mut g = glove();
    let frame = codec::encode(&GridCommand::new(7, [f32::NAN, 0.5, f32::NAN, f32::INFINITY]));
    g.on_packet(&grid_write(&frame));

    let duties: Vec<u16> = g.mapper().driver().writes.iter().map(|&(_, d)| d).collect();
    assert_eq!(duties, [0, 12, 0, 24]);
}

#[test]
fn short_write_is_dropped_without_actuation() {
    let mut g = glove();
    let reaction = g.on_packet(&grid_write(&SCENARIO[..17]));
    assert!(matches!(reaction, Reaction::Dropped(_)));
    assert!(g.mapper().driver().writes.is_empty());
}

#[test]
fn events_are_handled_in_arrival_order() {
    let mut g = glove();
    g.tick(0);
    let stream = [connection_complete(), disconnection(), connection_complete()];
    for packet in &stream {
        g.on_packet(packet);
    }
    assert_eq!(g.session().state(), SessionState::Connected);
    assert_eq!(g.session().peer().map(|p| p.connection), Some(CONN));
}
