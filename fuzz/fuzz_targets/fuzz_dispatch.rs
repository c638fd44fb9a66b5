//! Fuzz target: `ProtocolEngine::dispatch`
//!
//! Feeds arbitrary frames from a trusted and an untrusted endpoint. The
//! engine must never panic, and an unauthenticated websocket client must
//! never reach a dock command.
//!
//! cargo fuzz run fuzz_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use yiodock::rpc::auth::Endpoint;
use yiodock::rpc::engine::{Action, AuthPolicy, ProtocolEngine};

const POLICY: AuthPolicy<'static> = AuthPolicy {
    token: "fuzz-token",
    provisioning_requires_auth: true,
};

fuzz_target!(|data: &[u8]| {
    let mut engine = ProtocolEngine::new();

    let _ = engine.dispatch(Endpoint::SERIAL, data, POLICY);

    let ws = Endpoint::websocket(1);
    engine.on_connect(ws);
    if let Ok(request) = engine.dispatch(ws, data, POLICY) {
        assert!(!matches!(request.action, Action::Command(_)));
        assert!(request.provision.is_none());
    }
});
