use std::io::{self, Write};

use crc32fast::Hasher;
use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::decoder::{FCOMMENT, FNAME, MAGIC, METHOD_DEFLATE};
use crate::errors::GzipError;
use crate::parameters::GzipParameters;

/// Streaming gzip encoder writing a single member
///
/// The trailer is only written by [`GzipEncoder::finish`].
pub struct GzipEncoder<W: Write> {
    deflater: DeflateEncoder<W>,
    crc: Hasher,
    size: u32,
}

impl<W: Write> GzipEncoder<W> {
    /// Write the member header described by `parameters`
    pub fn new(mut inner: W, parameters: &GzipParameters) -> Result<GzipEncoder<W>, GzipError> {
        inner.write_all(&header(parameters))?;

        Ok(GzipEncoder {
            deflater: DeflateEncoder::new(inner, Compression::new(parameters.compression_level())),
            crc: Hasher::new(),
            size: 0,
        })
    }

    /// Flush the deflate stream, write the trailer and return the writer
    pub fn finish(self) -> io::Result<W> {
        let mut inner = self.deflater.finish()?;

        inner.write_all(&self.crc.finalize().to_le_bytes())?;
        inner.write_all(&self.size.to_le_bytes())?;

        Ok(inner)
    }
}

impl<W: Write> Write for GzipEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.deflater.write(buf)?;

        self.crc.update(&buf[..written]);
        self.size = self.size.wrapping_add(written as u32);

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.deflater.flush()
    }
}

fn header(parameters: &GzipParameters) -> Vec<u8> {
    let mut flags = 0;
    if parameters.filename.is_some() {
        flags |= FNAME;
    }
    if parameters.comment.is_some() {
        flags |= FCOMMENT;
    }

    let mtime = (parameters.modification_time / 1000) as u32;

    let mut out = Vec::with_capacity(10);
    out.extend_from_slice(&MAGIC);
    out.push(METHOD_DEFLATE);
    out.push(flags);
    out.extend_from_slice(&mtime.to_le_bytes());
    out.push(parameters.extra_flags());
    out.push(parameters.operating_system);

    for text in [&parameters.filename, &parameters.comment].into_iter().flatten() {
        out.extend(latin1(text));
        out.push(0);
    }

    out
}

/// ISO-8859-1 bytes, unmappable characters become `?`
fn latin1(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .map(|b| if b == 0 { b'?' } else { b })
}
