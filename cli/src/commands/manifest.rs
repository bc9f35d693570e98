use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use apkparse::Locale;
use apkparse_axml::AxmlDecoder;

use crate::commands::path_helpers::{is_archive, open_apk};

pub(crate) fn command_manifest(path: &Path, locale: Option<Locale>) -> Result<()> {
    if is_archive(path) {
        let apk = open_apk(path, locale)?;
        println!("{}", apk.get_manifest_xml()?);
    } else {
        let data = fs::read(path).with_context(|| format!("can't open and read file: {:?}", path))?;
        let xml = AxmlDecoder::new()
            .to_xml(&data)
            .with_context(|| format!("can't decode binary xml: {:?}", path))?;

        println!("{}", xml);
    }

    Ok(())
}
