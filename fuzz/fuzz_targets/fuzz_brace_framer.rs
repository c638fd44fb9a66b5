//! Fuzz target: `BraceFramer::feed`
//!
//! Drives arbitrary byte sequences into the streaming brace framer and
//! asserts that every emitted frame is brace-delimited and bounded, and
//! that a reset leaves the framer idle.
//!
//! cargo fuzz run fuzz_brace_framer

#![no_main]

use libfuzzer_sys::fuzz_target;
use yiodock::rpc::codec::{BraceFramer, MAX_FRAME_LEN};

fuzz_target!(|data: &[u8]| {
    let mut framer = BraceFramer::new();

    framer.feed(data, |frame| {
        assert!(frame.len() >= 2 && frame.len() <= MAX_FRAME_LEN);
        assert_eq!(frame.first(), Some(&b'{'));
        assert_eq!(frame.last(), Some(&b'}'));
    });

    framer.reset();
    assert!(!framer.is_pending());
    framer.feed(data, |_| {});
});
