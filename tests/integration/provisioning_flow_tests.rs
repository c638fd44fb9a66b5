//! WiFi provisioning from credentials to advertised service.

use yiodock::app::events::{AppEvent, RestartReason};
use yiodock::app::ports::ConnectivityEvent;
use yiodock::config::{DockConfig, WifiCredentials};
use yiodock::fsm::DeviceState;
use yiodock::rpc::auth::Endpoint;

use crate::mock_hw::{Advertised, HOSTNAME, Rig};

const CREDS: &str = r#"{"ssid":"home","password":"hunter22"}"#;
const PROVISION_OK: &str = r#"{"type":"dock","message":"provision","success":true}"#;

#[test]
fn boot_without_credentials_waits_in_setup() {
    let rig = Rig::new();
    assert_eq!(rig.service.state(), DeviceState::Setup);
    assert_eq!(rig.mocks.wifi.connect_calls, 0);
    assert_eq!(rig.events(), [AppEvent::Started(DeviceState::Setup)]);
}

#[test]
fn boot_with_stored_credentials_connects() {
    let creds = WifiCredentials::new("home", "hunter22").unwrap();
    let rig = Rig::with_config(DockConfig::default(), Some(creds.clone()));
    assert_eq!(rig.service.state(), DeviceState::Connecting);
    assert_eq!(rig.mocks.wifi.credentials, Some(creds));
    assert_eq!(rig.mocks.wifi.connect_calls, 1);
}

#[test]
fn bluetooth_credentials_run_the_full_flow() {
    let mut rig = Rig::new();

    let replies = rig.send_texts(Endpoint::BLUETOOTH, CREDS);
    assert_eq!(replies, [PROVISION_OK]);
    assert_eq!(
        rig.mocks.config.credentials.as_ref().map(|c| c.ssid.as_str()),
        Some("home")
    );
    assert_eq!(rig.mocks.wifi.disconnect_calls, 1);
    assert_eq!(rig.mocks.wifi.connect_calls, 1);
    assert_eq!(rig.service.state(), DeviceState::Connecting);
    assert!(rig.events().contains(&AppEvent::CredentialsReceived));

    rig.connectivity(ConnectivityEvent::Connected);
    assert_eq!(rig.service.state(), DeviceState::ConnSuccess);
    assert_eq!(
        rig.mocks.advertise.started,
        Some(Advertised {
            hostname: HOSTNAME.into(),
            friendly_name: HOSTNAME.into(),
            api_port: 946,
            ota_port: 3232,
        })
    );

    rig.led_sequence_done();
    assert_eq!(rig.service.state(), DeviceState::Normal);
}

#[test]
fn credentials_ride_along_with_other_messages() {
    let mut rig = Rig::new();
    let replies = rig.send_texts(
        Endpoint::SERIAL,
        r#"{"type":"dock","command":"ping","ssid":"home","password":"hunter22"}"#,
    );
    assert_eq!(replies, [PROVISION_OK, r#"{"type":"dock","message":"pong"}"#]);
}

#[test]
fn oversized_ssid_is_refused() {
    let mut rig = Rig::new();
    let frame = format!(r#"{{"ssid":"{}","password":"hunter22"}}"#, "s".repeat(40));
    let replies = rig.send_texts(Endpoint::BLUETOOTH, &frame);
    assert_eq!(
        replies,
        [r#"{"type":"dock","message":"provision","success":false}"#]
    );
    assert!(rig.mocks.config.credentials.is_none());
    assert_eq!(rig.service.state(), DeviceState::Setup);
}

#[test]
fn gated_provisioning_needs_an_authorized_websocket() {
    let config = DockConfig {
        provisioning_requires_auth: true,
        ..DockConfig::default()
    };
    let mut rig = Rig::with_config(config, None);

    let ws = Endpoint::websocket(1);
    rig.connect(ws);
    assert!(rig.send(ws, CREDS).is_empty());
    assert!(rig.mocks.config.credentials.is_none());

    let ws = rig.authorized_ws(2);
    assert_eq!(rig.send_texts(ws, CREDS), [PROVISION_OK]);
}

#[test]
fn mdns_failure_puts_the_dock_in_error() {
    let mut rig = Rig::new();
    rig.mocks.advertise.fail_start = true;
    rig.connectivity(ConnectivityEvent::Connected);
    assert_eq!(rig.service.state(), DeviceState::Error);
}

#[test]
fn exhausted_reconnects_restart_the_dock() {
    let mut rig = Rig::new();
    rig.connectivity(ConnectivityEvent::Disconnected);
    assert!(rig.mocks.system.restart_in.is_none());

    rig.connectivity(ConnectivityEvent::GaveUp);
    assert!(rig.mocks.system.restart_in.is_some());
    assert!(
        rig.events()
            .contains(&AppEvent::RestartScheduled(RestartReason::WifiGaveUp))
    );
}
