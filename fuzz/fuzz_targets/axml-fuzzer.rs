#![no_main]

use apkparse_axml::{ApkMetaTranslator, AxmlDecoder, CompositeSink, ResourceTable, XmlPrinter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least 8 bytes
    if data.len() < 8 {
        return;
    }

    let table = ResourceTable::empty();
    let mut printer = XmlPrinter::new();
    let mut translator = ApkMetaTranslator::new(&table, None);
    let mut sink = CompositeSink::new().with(&mut printer).with(&mut translator);

    let _ = AxmlDecoder::new().decode(data, &mut sink);
});
