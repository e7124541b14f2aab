//! Fuzz target: `GpioInstruction::unflatten`
//!
//! Drives arbitrary byte sequences through the GPIO instruction decoder —
//! both the positional and device-string layouts, selected by the flags
//! word — and asserts that it never panics and that accepted input
//! round-trips unchanged.
//!
//! cargo fuzz run fuzz_gpio_unflatten

#![no_main]

use fspproto::instruction::gpio::GpioInstruction;
use fspproto::instruction::{flatten_to_vec, Instruction};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut inst = GpioInstruction::new();
    if inst.unflatten(data).is_err() {
        return;
    }

    let bytes = flatten_to_vec(&inst).expect("accepted instruction must re-encode");
    assert_eq!(bytes.len(), inst.flatten_size());

    let mut again = GpioInstruction::new();
    again
        .unflatten(&bytes)
        .expect("re-encoded instruction must decode");
    assert_eq!(again, inst);
});
