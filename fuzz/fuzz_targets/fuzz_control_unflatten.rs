//! Fuzz target: `ControlInstruction::unflatten`
//!
//! Drives arbitrary byte sequences through the control instruction decoder
//! and asserts that it never panics and that anything it accepts survives a
//! flatten/unflatten round trip unchanged.
//!
//! cargo fuzz run fuzz_control_unflatten

#![no_main]

use fspproto::instruction::control::ControlInstruction;
use fspproto::instruction::{flatten_to_vec, Instruction};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut inst = ControlInstruction::new();
    if inst.unflatten(data).is_err() {
        return;
    }

    // Accepted input: re-encoding must be exact-size and round-trip clean.
    let bytes = flatten_to_vec(&inst).expect("accepted instruction must re-encode");
    assert_eq!(bytes.len(), inst.flatten_size());

    let mut again = ControlInstruction::new();
    again
        .unflatten(&bytes)
        .expect("re-encoded instruction must decode");
    assert_eq!(again, inst);
});
