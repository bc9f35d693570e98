#![no_main]

use apkparse_buffer::Interrupt;
use apkparse_dex::Dex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 8 bytes
    if data.len() < 8 {
        return;
    }

    if let Ok(dex) = Dex::new(data.to_vec()) {
        let _ = dex.verify_checksum();
        let _ = dex.classes(&Interrupt::none());
    }
});
