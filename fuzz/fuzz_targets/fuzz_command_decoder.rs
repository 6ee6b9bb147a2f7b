//! Fuzz the inbound command decoder: arbitrary broker payloads must
//! decode, classify as unknown, or fail typed — never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = homenode::commands::decode_command(data);
});
