//! Operating-mode transitions and the IR receive broadcast.

use yiodock::app::commands::HardwareEvent;
use yiodock::app::events::{AppEvent, RestartReason};
use yiodock::fsm::DeviceState;
use yiodock::rpc::auth::Endpoint;

use crate::mock_hw::Rig;

fn nec_like_capture() -> Vec<u32> {
    let mut d = vec![9000, 4500];
    for _ in 0..8 {
        d.extend([560, 1690]);
    }
    d.push(560);
    d
}

#[test]
fn charge_pin_drives_charging_states() {
    let mut rig = Rig::new();
    rig.hardware(HardwareEvent::ChargePinAsserted);
    assert_eq!(rig.service.state(), DeviceState::NormalCharging);

    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"remote_charged"}"#);
    assert_eq!(rig.service.state(), DeviceState::NormalFullyCharged);

    rig.hardware(HardwareEvent::ChargePinReleased);
    assert_eq!(rig.service.state(), DeviceState::Normal);

    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"remote_lowbattery"}"#);
    assert_eq!(rig.service.state(), DeviceState::NormalLowBattery);
}

#[test]
fn transitions_are_reported_once() {
    let mut rig = Rig::new();
    rig.hardware(HardwareEvent::ChargePinAsserted);
    rig.hardware(HardwareEvent::ChargePinAsserted);

    let changes: Vec<_> = rig
        .events()
        .iter()
        .filter(|e| matches!(e, AppEvent::StateChanged { .. }))
        .collect();
    assert_eq!(
        changes,
        [&AppEvent::StateChanged {
            from: DeviceState::Setup,
            to: DeviceState::NormalCharging,
        }]
    );
}

#[test]
fn docked_at_boot_starts_charging() {
    let mut mocks = crate::mock_hw::Mocks::new();
    let mut service =
        yiodock::app::service::DockService::new(Default::default(), crate::mock_hw::HOSTNAME);
    service.start(true, &mut mocks.ports());
    assert_eq!(service.state(), DeviceState::NormalCharging);
}

#[test]
fn success_blink_end_only_matters_after_connecting() {
    let mut rig = Rig::new();
    rig.led_sequence_done();
    assert_eq!(rig.service.state(), DeviceState::Setup);
}

#[test]
fn reset_hold_is_a_factory_reset() {
    let mut rig = Rig::new();
    rig.hardware(HardwareEvent::ResetHold);
    assert!(rig.mocks.config.erased);
    assert!(
        rig.events()
            .contains(&AppEvent::RestartScheduled(RestartReason::FactoryReset))
    );
}

#[test]
fn captures_reach_authorized_clients_while_receiving() {
    let mut rig = Rig::new();
    let a = rig.authorized_ws(1);
    let b = rig.authorized_ws(2);
    rig.connect(Endpoint::websocket(3));

    // receiver off: nothing forwarded
    assert!(rig.captured(nec_like_capture()).is_empty());

    rig.send(a, r#"{"type":"dock","command":"ir_receive_on"}"#);
    let frames = rig.captured(nec_like_capture());
    let mut to: Vec<_> = frames.iter().map(|f| f.to).collect();
    to.sort_by_key(|e| e.id);
    assert_eq!(to, [a, b]);
    assert!(frames[0].text.starts_with(
        r#"{"type":"dock","command":"ir_receive","code":"38000,9000,4500,560,1690"#
    ));
    assert!(rig.events().contains(&AppEvent::IrForwarded { clients: 2 }));
}

#[test]
fn short_captures_are_noise() {
    let mut rig = Rig::new();
    rig.authorized_ws(1);
    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"ir_receive_on"}"#);
    assert!(rig.captured(vec![560, 560, 560]).is_empty());
}
