use std::io::{self, BufRead, Read};

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};
use log::debug;

use crate::errors::GzipError;
use crate::parameters::GzipParameters;

pub(crate) const MAGIC: [u8; 2] = [0x1f, 0x8b];
pub(crate) const METHOD_DEFLATE: u8 = 8;

pub(crate) const FHCRC: u8 = 0x02;
pub(crate) const FEXTRA: u8 = 0x04;
pub(crate) const FNAME: u8 = 0x08;
pub(crate) const FCOMMENT: u8 = 0x10;
pub(crate) const FRESERVED: u8 = 0xe0;

/// Streaming gzip decoder
///
/// Only bytes that belong to the consumed members are taken from the
/// underlying reader. In single-member mode the reader is left at the first
/// byte after the trailer.
pub struct GzipDecoder<R> {
    inner: R,
    concatenated: bool,
    inflater: Decompress,
    crc: Hasher,
    parameters: GzipParameters,
    done: bool,
}

impl<R: BufRead> GzipDecoder<R> {
    /// Read the first member header
    pub fn new(mut inner: R, decompress_concatenated: bool) -> Result<GzipDecoder<R>, GzipError> {
        let parameters = read_header(&mut inner, true)?.ok_or(GzipError::NotGzip)?;

        Ok(GzipDecoder {
            inner,
            concatenated: decompress_concatenated,
            inflater: Decompress::new(false),
            crc: Hasher::new(),
            parameters,
            done: false,
        })
    }

    /// Header of the member being decoded
    #[inline]
    pub fn parameters(&self) -> &GzipParameters {
        &self.parameters
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub(crate) fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, GzipError> {
        if buf.is_empty() {
            return Ok(0);
        }

        while !self.done {
            let input = self.inner.fill_buf()?;
            let eof = input.is_empty();

            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();
            let status = self
                .inflater
                .decompress(input, buf, FlushDecompress::None)
                .map_err(|_| GzipError::Corrupt)?;

            let consumed = (self.inflater.total_in() - before_in) as usize;
            let written = (self.inflater.total_out() - before_out) as usize;

            self.inner.consume(consumed);
            self.crc.update(&buf[..written]);

            if status == Status::StreamEnd {
                self.finish_member()?;
            } else if written == 0 && (eof || consumed == 0) {
                return Err(if eof {
                    GzipError::Truncated
                } else {
                    GzipError::Corrupt
                });
            }

            if written > 0 {
                return Ok(written);
            }
        }

        Ok(0)
    }

    /// Check the trailer and move on to the next member if allowed
    fn finish_member(&mut self) -> Result<(), GzipError> {
        let expected_crc = read_u32(&mut self.inner)?;
        let expected_size = read_u32(&mut self.inner)?;

        if expected_crc != self.crc.clone().finalize() {
            return Err(GzipError::CrcMismatch);
        }

        // ISIZE is the size modulo 2^32
        if expected_size != self.inflater.total_out() as u32 {
            return Err(GzipError::SizeMismatch);
        }

        debug!(
            "gzip member done, {} bytes in, {} bytes out",
            self.inflater.total_in(),
            self.inflater.total_out()
        );

        if !self.concatenated {
            self.done = true;
            return Ok(());
        }

        match read_header(&mut self.inner, false)? {
            Some(parameters) => {
                self.parameters = parameters;
                self.inflater.reset(false);
                self.crc = Hasher::new();
            }
            None => self.done = true,
        }

        Ok(())
    }
}

impl<R: BufRead> Read for GzipDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(io::Error::from)
    }
}

fn read_u8<R: BufRead>(reader: &mut R) -> Result<u8, GzipError> {
    let byte = *reader.fill_buf()?.first().ok_or(GzipError::Truncated)?;
    reader.consume(1);

    Ok(byte)
}

fn read_u16<R: BufRead>(reader: &mut R) -> Result<u16, GzipError> {
    Ok(u16::from_le_bytes([read_u8(reader)?, read_u8(reader)?]))
}

fn read_u32<R: BufRead>(reader: &mut R) -> Result<u32, GzipError> {
    let mut bytes = [0u8; 4];
    for byte in &mut bytes {
        *byte = read_u8(reader)?;
    }

    Ok(u32::from_le_bytes(bytes))
}

/// NUL-terminated ISO-8859-1 string
fn read_latin1<R: BufRead>(reader: &mut R) -> Result<String, GzipError> {
    let mut text = String::new();
    loop {
        match read_u8(reader)? {
            0 => return Ok(text),
            byte => text.push(char::from(byte)),
        }
    }
}

/// Parse a member header
///
/// For members after the first one, end of input yields `None`.
fn read_header<R: BufRead>(
    reader: &mut R,
    first: bool,
) -> Result<Option<GzipParameters>, GzipError> {
    if !first && reader.fill_buf()?.is_empty() {
        return Ok(None);
    }

    let bad_magic = || {
        if first {
            GzipError::NotGzip
        } else {
            GzipError::Garbage
        }
    };

    let magic = [read_u8(reader)?, read_u8(reader).map_err(|_| bad_magic())?];
    if magic != MAGIC {
        return Err(bad_magic());
    }

    let method = read_u8(reader)?;
    if method != METHOD_DEFLATE {
        return Err(GzipError::UnsupportedMethod(method));
    }

    let flags = read_u8(reader)?;
    if flags & FRESERVED != 0 {
        return Err(GzipError::ReservedFlags);
    }

    let mut parameters = GzipParameters::default();
    parameters.modification_time = u64::from(read_u32(reader)?) * 1000;
    parameters.apply_extra_flags(read_u8(reader)?);
    parameters.operating_system = read_u8(reader)?;

    if flags & FEXTRA != 0 {
        let len = read_u16(reader)?;
        for _ in 0..len {
            read_u8(reader)?;
        }
    }

    if flags & FNAME != 0 {
        parameters.filename = Some(read_latin1(reader)?);
    }

    if flags & FCOMMENT != 0 {
        parameters.comment = Some(read_latin1(reader)?);
    }

    // header crc16 is not verified
    if flags & FHCRC != 0 {
        read_u16(reader)?;
    }

    Ok(Some(parameters))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `printf 'hi' | gzip -n`
    const HI: &[u8] = &[
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0xc8, 0x04, 0x00, 0xac,
        0x2a, 0x93, 0xd8, 0x02, 0x00, 0x00, 0x00,
    ];

    fn decode(data: &[u8], concatenated: bool) -> Result<Vec<u8>, GzipError> {
        let mut decoder = GzipDecoder::new(data, concatenated)?;
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(GzipError::from_io)?;

        Ok(out)
    }

    #[test]
    fn decodes_gzip_output() {
        let decoder = GzipDecoder::new(HI, false).unwrap();
        assert_eq!(decoder.parameters().operating_system, 3);
        assert_eq!(decoder.parameters().modification_time, 0);
        assert_eq!(decode(HI, false).unwrap(), b"hi");
    }

    #[test]
    fn header_fields() {
        let mut data = vec![0x1f, 0x8b, 8, FNAME | FCOMMENT | FEXTRA | FHCRC];
        data.extend_from_slice(&1_000u32.to_le_bytes());
        data.extend_from_slice(&[2, 0]);
        data.extend_from_slice(&[3, 0, 1, 2, 3]);
        data.extend_from_slice(b"caf\xe9.txt\0");
        data.extend_from_slice(b"note\0");
        data.extend_from_slice(&[0xaa, 0xbb]);
        data.extend_from_slice(&HI[10..]);

        let decoder = GzipDecoder::new(&data[..], false).unwrap();
        let params = decoder.parameters();
        assert_eq!(params.filename.as_deref(), Some("café.txt"));
        assert_eq!(params.comment.as_deref(), Some("note"));
        assert_eq!(params.modification_time, 1_000_000);
        assert_eq!(params.compression_level(), 9);
        assert_eq!(params.operating_system, 0);

        assert_eq!(decode(&data, false).unwrap(), b"hi");
    }

    #[test]
    fn header_errors() {
        assert!(matches!(decode(b"PK\x03\x04", false), Err(GzipError::NotGzip)));
        assert!(matches!(decode(b"", false), Err(GzipError::Truncated)));
        assert!(matches!(
            decode(&[0x1f, 0x8b, 7, 0], false),
            Err(GzipError::UnsupportedMethod(7))
        ));
        assert!(matches!(
            decode(&[0x1f, 0x8b, 8, 0x20], false),
            Err(GzipError::ReservedFlags)
        ));
    }

    #[test]
    fn concatenated_members() {
        let data = [HI, HI].concat();

        assert_eq!(decode(&data, true).unwrap(), b"hihi");
        assert_eq!(decode(&data, false).unwrap(), b"hi");
    }

    #[test]
    fn single_member_leaves_reader_at_next_member() {
        let data = [HI, HI].concat();
        let mut decoder = GzipDecoder::new(&data[..], false).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();

        assert_eq!(decoder.into_inner(), HI);
    }

    #[test]
    fn garbage_after_member() {
        let data = [HI, b"junk"].concat();

        assert!(matches!(decode(&data, true), Err(GzipError::Garbage)));
        assert_eq!(decode(&data, false).unwrap(), b"hi");
    }

    #[test]
    fn trailer_mismatch() {
        let len = HI.len();

        let mut data = HI.to_vec();
        data[len - 8] ^= 0x01;
        assert!(matches!(decode(&data, false), Err(GzipError::CrcMismatch)));

        let mut data = HI.to_vec();
        data[len - 1] ^= 0x80;
        assert!(matches!(decode(&data, false), Err(GzipError::SizeMismatch)));
    }

    #[test]
    fn truncated_member() {
        for cut in 10..HI.len() {
            assert!(
                matches!(decode(&HI[..cut], false), Err(GzipError::Truncated)),
                "cut at {cut}"
            );
        }
    }
}
