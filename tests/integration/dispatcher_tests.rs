//! Dock commands end to end: frame in, port calls and reply frames out.

use yiodock::app::events::{AppEvent, RestartReason};
use yiodock::fsm::DeviceState;
use yiodock::rpc::auth::Endpoint;

use crate::mock_hw::{HOSTNAME, Rig};

#[test]
fn ping_over_serial_answers_pong() {
    let mut rig = Rig::new();
    let replies = rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"ping"}"#);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to, Endpoint::SERIAL);
    assert_eq!(replies[0].text, r#"{"type":"dock","message":"pong"}"#);
}

#[test]
fn malformed_and_unknown_frames_are_silent() {
    let mut rig = Rig::new();
    assert!(rig.send(Endpoint::SERIAL, "{\"type\":").is_empty());
    assert!(rig.send(Endpoint::SERIAL, "[1,2,3]").is_empty());
    assert!(rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"fly"}"#).is_empty());
    assert!(rig.send(Endpoint::SERIAL, r#"{"type":"status"}"#).is_empty());
    assert_eq!(rig.service.engine().frame_counts(), (4, 2));
}

#[test]
fn ir_send_raw_transmits_and_reports_success() {
    let mut rig = Rig::new();
    let replies = rig.send_texts(
        Endpoint::BLUETOOTH,
        r#"{"type":"dock","command":"ir_send","format":"raw","code":"38000,9000,4500,560,1690,560"}"#,
    );
    assert_eq!(replies, [r#"{"type":"dock","message":"ir_send","success":true}"#]);

    let sent = &rig.mocks.ir.sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].frequency_hz, 38_000);
    assert_eq!(sent[0].timings, vec![9000, 4500, 560, 1690, 560]);
    assert!(rig.events().contains(&AppEvent::IrSent { success: true }));
}

#[test]
fn ir_send_protocol_code_is_encoded_before_transmission() {
    let mut rig = Rig::new();
    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"ir_send","format":"hex","code":"0x20DF10EF","decodeType":3,"bits":32}"#,
    );
    assert_eq!(replies, [r#"{"type":"dock","message":"ir_send","success":true}"#]);
    let sent = &rig.mocks.ir.sent[0];
    assert_eq!(sent.frequency_hz, 38_000);
    assert!(sent.timings.len() > 64);
}

#[test]
fn ir_send_failure_is_reported() {
    let mut rig = Rig::new();
    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"ir_send","format":"raw","code":"38000,x,1"}"#,
    );
    assert_eq!(replies, [r#"{"type":"dock","message":"ir_send","success":false}"#]);

    rig.mocks.ir.fail_transmit = true;
    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"ir_send","format":"raw","code":"38000,100,200"}"#,
    );
    assert_eq!(replies, [r#"{"type":"dock","message":"ir_send","success":false}"#]);
    assert!(rig.mocks.ir.sent.is_empty());
    assert!(rig.events().contains(&AppEvent::IrSent { success: false }));
}

#[test]
fn led_brightness_setup_round_trip() {
    let mut rig = Rig::new();
    let replies = rig.send(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"led_brightness_start","brightness":"180"}"#,
    );
    assert!(replies.is_empty());
    assert_eq!(rig.service.state(), DeviceState::LedSetup);
    assert_eq!(rig.mocks.led.max, 180);

    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"led_brightness_stop"}"#);
    assert_eq!(rig.service.state(), DeviceState::Normal);
    assert_eq!(rig.mocks.led.off_calls, 1);
    assert_eq!(rig.mocks.config.config.led_brightness, 180);
    assert_eq!(rig.service.config().led_brightness, 180);
}

#[test]
fn friendly_name_is_persisted_and_advertised() {
    let mut rig = Rig::new();
    rig.connectivity(yiodock::app::ports::ConnectivityEvent::Connected);

    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"set_friendly_name","friendly_name":"  Living Room "}"#,
    );
    assert_eq!(
        replies,
        [r#"{"type":"dock","message":"set_friendly_name","success":true}"#]
    );
    assert_eq!(rig.mocks.config.config.friendly_name.as_str(), "Living Room");
    assert_eq!(rig.mocks.advertise.renames, ["Living Room"]);

    // an empty name falls back to the hostname
    rig.send(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"set_friendly_name","friendly_name":""}"#,
    );
    assert_eq!(rig.mocks.advertise.renames.last().map(String::as_str), Some(HOSTNAME));
}

#[test]
fn friendly_name_save_failure_keeps_old_name() {
    let mut rig = Rig::new();
    rig.mocks.config.fail_saves = true;
    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"set_friendly_name","friendly_name":"Den"}"#,
    );
    assert_eq!(
        replies,
        [r#"{"type":"dock","message":"set_friendly_name","success":false}"#]
    );
    assert!(rig.service.config().friendly_name.is_empty());
}

#[test]
fn reboot_schedules_one_delayed_restart() {
    let mut rig = Rig::new();
    assert!(rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"reboot"}"#).is_empty());
    assert_eq!(rig.mocks.system.restart_in, Some(rig.service.config().restart_grace_ms));

    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"reboot"}"#);
    assert_eq!(rig.mocks.system.requests, 1);
    assert!(
        rig.events()
            .contains(&AppEvent::RestartScheduled(RestartReason::Requested))
    );
}

#[test]
fn reset_erases_configuration_then_restarts() {
    let mut rig = Rig::new();
    rig.send(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"set_friendly_name","friendly_name":"Den"}"#,
    );
    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"reset"}"#);

    assert!(rig.mocks.config.erased);
    assert!(rig.service.config().friendly_name.is_empty());
    assert!(rig.mocks.system.restart_in.is_some());
    assert!(
        rig.events()
            .contains(&AppEvent::RestartScheduled(RestartReason::FactoryReset))
    );
}

#[test]
fn ir_receive_toggles_the_receiver() {
    let mut rig = Rig::new();
    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"ir_receive_on"}"#);
    assert!(rig.mocks.ir.receiving);
    assert!(rig.service.is_ir_receiving());

    rig.send(Endpoint::SERIAL, r#"{"type":"dock","command":"ir_receive_off"}"#);
    assert!(!rig.mocks.ir.receiving);
    assert!(!rig.service.is_ir_receiving());
}

#[test]
fn overlong_hostname_keeps_a_prefix() {
    let long = format!("{HOSTNAME}-{}", "x".repeat(40));
    let service = yiodock::app::service::DockService::new(Default::default(), &long);
    assert_eq!(service.hostname(), &long[..32]);

    let service = yiodock::app::service::DockService::new(Default::default(), HOSTNAME);
    assert_eq!(service.hostname(), HOSTNAME);
}
