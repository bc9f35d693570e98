#![no_main]

use apkparse::Apk;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(apk) = Apk::from_bytes(data.to_vec()) else {
        return;
    };

    let _ = apk.get_meta();
    let _ = apk.get_all_icons();
    let _ = apk.get_dex_classes();
    let _ = apk.get_signers_v1();
    let _ = apk.get_signers_v2();
});
