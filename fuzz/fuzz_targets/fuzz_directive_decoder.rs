//! Fuzz the OTA directive decoder, checksum hex parsing included.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = homenode::commands::decode_directive(data);
});
