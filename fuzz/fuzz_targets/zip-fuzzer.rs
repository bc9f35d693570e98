#![no_main]

use apkparse_zip::ZipArchive;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(zip) = ZipArchive::new(data.to_vec()) else {
        return;
    };

    let names: Vec<String> = zip.namelist().map(str::to_owned).collect();
    for name in &names {
        let _ = zip.read(name);
    }

    let _ = zip.signers_v1();
    let _ = zip.signers_v2();
});
