#![no_main]

use apkparse_axml::{Locale, ResourceTable};
use apkparse_buffer::Interrupt;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // must provide at least a table header
    if data.len() < 12 {
        return;
    }

    let Ok(table) = ResourceTable::parse(data, &Interrupt::none()) else {
        return;
    };

    let locale = Locale::en_us();
    for package in table.packages() {
        let id = (u32::from(package.id) << 24) | 0x010000;
        if let Some(resource) = table.select(id, Some(&locale)) {
            let _ = resource.to_string_value(&table, Some(&locale));
        }
    }
    let _ = table.locales();
});
