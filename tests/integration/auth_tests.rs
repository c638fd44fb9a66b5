//! Websocket authentication through the dock service.

use yiodock::app::events::AppEvent;
use yiodock::config::DockConfig;
use yiodock::error::AuthError;
use yiodock::rpc::auth::Endpoint;

use crate::mock_hw::Rig;

const PING: &str = r#"{"type":"dock","command":"ping"}"#;
const PONG: &str = r#"{"type":"dock","message":"pong"}"#;

#[test]
fn websocket_client_is_greeted() {
    let mut rig = Rig::new();
    let greeting = rig.connect(Endpoint::websocket(7)).unwrap();
    assert_eq!(greeting.to, Endpoint::websocket(7));
    assert_eq!(greeting.text, r#"{"type":"auth_required"}"#);

    assert!(rig.connect(Endpoint::SERIAL).is_none());
    assert!(rig.connect(Endpoint::BLUETOOTH).is_none());
}

#[test]
fn commands_wait_for_the_token() {
    let mut rig = Rig::new();
    let ws = Endpoint::websocket(1);
    rig.connect(ws);

    assert!(rig.send(ws, PING).is_empty());

    let replies = rig.send_texts(ws, r#"{"type":"auth","token":"0"}"#);
    assert_eq!(replies, [r#"{"type":"auth_ok"}"#]);
    assert_eq!(rig.send_texts(ws, PING), [PONG]);
    assert!(rig.events().contains(&AppEvent::Authenticated(ws)));
}

#[test]
fn rejected_tokens_get_an_auth_message() {
    let mut rig = Rig::new();
    let ws = Endpoint::websocket(2);
    rig.connect(ws);

    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth"}"#),
        [r#"{"type":"auth","message":"Token needed"}"#]
    );
    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth","token":"guess"}"#),
        [r#"{"type":"auth","message":"Invalid token"}"#]
    );
    assert!(rig.send(ws, PING).is_empty());
    assert!(rig.events().contains(&AppEvent::AuthRejected {
        endpoint: ws,
        reason: AuthError::InvalidToken,
    }));
}

#[test]
fn configured_token_replaces_the_default() {
    let mut config = DockConfig::default();
    config.api_token.clear();
    let _ = config.api_token.push_str("s3cret");
    let mut rig = Rig::with_config(config, None);

    let ws = Endpoint::websocket(3);
    rig.connect(ws);
    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth","token":"0"}"#),
        [r#"{"type":"auth","message":"Invalid token"}"#]
    );
    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth","token":"s3cret"}"#),
        [r#"{"type":"auth_ok"}"#]
    );
}

#[test]
fn authorization_ends_with_the_connection() {
    let mut rig = Rig::new();
    let ws = rig.authorized_ws(4);
    assert_eq!(rig.send_texts(ws, PING), [PONG]);

    rig.disconnect(ws);
    assert!(rig.send(ws, PING).is_empty());

    // same id, new connection: starts over
    rig.connect(ws);
    assert!(rig.send(ws, PING).is_empty());
}

#[test]
fn sessions_are_independent() {
    let mut rig = Rig::new();
    let a = rig.authorized_ws(10);
    let b = Endpoint::websocket(11);
    rig.connect(b);

    assert_eq!(rig.send_texts(a, PING), [PONG]);
    assert!(rig.send(b, PING).is_empty());
}

#[test]
fn physical_links_skip_authentication() {
    let mut rig = Rig::new();
    assert_eq!(rig.send_texts(Endpoint::SERIAL, PING), [PONG]);
    assert_eq!(rig.send_texts(Endpoint::BLUETOOTH, PING), [PONG]);
}

#[test]
fn reauthenticating_never_trips_the_limiter() {
    let mut rig = Rig::new();
    let ws = rig.authorized_ws(20);
    for _ in 0..12 {
        assert_eq!(
            rig.send_texts(ws, r#"{"type":"auth","token":"0"}"#),
            [r#"{"type":"auth_ok"}"#]
        );
    }
    assert_eq!(rig.send_texts(ws, PING), [PONG]);
}

#[test]
fn guessing_is_cut_off_across_reconnects() {
    let mut rig = Rig::new();
    let ws = Endpoint::websocket(21);
    rig.connect(ws);
    for _ in 0..10 {
        assert_eq!(
            rig.send_texts(ws, r#"{"type":"auth","token":"guess"}"#),
            [r#"{"type":"auth","message":"Invalid token"}"#]
        );
    }
    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth","token":"guess"}"#),
        [r#"{"type":"auth","message":"Too many attempts"}"#]
    );

    rig.disconnect(ws);
    rig.connect(ws);
    assert_eq!(
        rig.send_texts(ws, r#"{"type":"auth","token":"0"}"#),
        [r#"{"type":"auth","message":"Too many attempts"}"#]
    );
    assert!(rig.send(ws, PING).is_empty());
}

#[test]
fn sessions_without_a_live_connection_are_dropped() {
    let mut rig = Rig::new();
    let gone = rig.authorized_ws(30);
    let live = rig.authorized_ws(31);

    assert_eq!(rig.service.prune_websockets(|id| id == live.id), 1);
    assert!(rig.send(gone, PING).is_empty());
    assert_eq!(rig.send_texts(live, PING), [PONG]);
    assert_eq!(rig.service.prune_websockets(|id| id == live.id), 0);
}
