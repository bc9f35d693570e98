use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use apkparse_gzip::{GzipDecoder, GzipEncoder, GzipParameters};
use log::info;

pub(crate) fn command_gzip(
    input: &Path,
    output: &Path,
    decompress: bool,
    concatenated: bool,
    level: u32,
) -> Result<()> {
    let reader = BufReader::new(File::open(input).with_context(|| format!("can't open file: {:?}", input))?);
    let mut writer =
        BufWriter::new(File::create(output).with_context(|| format!("can't create file: {:?}", output))?);

    let written = if decompress {
        let mut decoder = GzipDecoder::new(reader, concatenated)
            .with_context(|| format!("not a gzip file: {:?}", input))?;
        io::copy(&mut decoder, &mut writer).with_context(|| format!("can't decompress: {:?}", input))?
    } else {
        let mut params = GzipParameters::default();
        params.filename = input.file_name().and_then(|name| name.to_str()).map(str::to_owned);
        params.modification_time = modification_time(input);
        params.set_compression_level(level)?;

        let mut reader = reader;
        let mut encoder = GzipEncoder::new(writer, &params)?;
        let written = io::copy(&mut reader, &mut encoder)?;
        writer = encoder.finish()?;
        written
    };

    io::Write::flush(&mut writer)?;
    info!("{} bytes processed, output written to {:?}", written, output);

    Ok(())
}

fn modification_time(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
