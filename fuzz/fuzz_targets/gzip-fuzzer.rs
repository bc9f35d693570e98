#![no_main]

use apkparse_gzip::decompress;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decompress(data, false);
    let _ = decompress(data, true);
});
