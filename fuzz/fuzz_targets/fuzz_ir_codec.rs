//! Fuzz target: IR code text decoders and timing conversion.
//!
//! Any text must either decode or fail with a typed error; anything that
//! decodes must convert to timings without panicking.
//!
//! cargo fuzz run fuzz_ir_codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use yiodock::ir::{IrCode, decode_pronto, decode_protocol, decode_raw, to_timings};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(raw) = decode_raw(text) {
        let _ = to_timings(&IrCode::Raw(raw));
    }
    if let Ok(pronto) = decode_pronto(text, 1) {
        let _ = to_timings(&IrCode::Pronto(pronto));
    }
    if let Ok(code) = decode_protocol(text) {
        let _ = to_timings(&IrCode::Protocol(code));
    }
});
