//! Gzip member codec.
//!
//! [`GzipDecoder`] validates every member header and trailer (CRC32 and
//! ISIZE) and can follow concatenated members. [`GzipEncoder`] writes the
//! matching header, including file name and comment.

pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod parameters;

use std::io::Write;

pub use decoder::GzipDecoder;
pub use encoder::GzipEncoder;
pub use errors::GzipError;
pub use parameters::GzipParameters;

/// Compress `data` into a single gzip member
pub fn compress(data: &[u8], parameters: &GzipParameters) -> Result<Vec<u8>, GzipError> {
    let mut encoder = GzipEncoder::new(Vec::with_capacity(data.len() / 2 + 32), parameters)?;
    encoder.write_all(data)?;

    Ok(encoder.finish()?)
}

/// Decompress the first member, or every member when `concatenated` is set
pub fn decompress(data: &[u8], concatenated: bool) -> Result<Vec<u8>, GzipError> {
    let mut decoder = GzipDecoder::new(data, concatenated)?;

    let mut out = Vec::with_capacity(data.len().saturating_mul(2));
    let mut chunk = [0u8; 8192];
    loop {
        match decoder.read_inner(&mut chunk)? {
            0 => return Ok(out),
            n => out.extend_from_slice(&chunk[..n]),
        }
    }
}
