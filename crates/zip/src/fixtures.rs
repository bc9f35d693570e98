//! Builders for synthetic archives used in tests

use std::io::Write;

use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::signing_block::APK_SIGNING_BLOCK_MAGIC;

struct FixtureEntry {
    name: String,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    payload: Vec<u8>,
}

/// Minimal zip writer
///
/// Entries are written in insertion order, the optional signing block goes
/// right before the central directory.
#[derive(Default)]
pub struct ZipWriter {
    entries: Vec<FixtureEntry>,
    signing_block: Option<Vec<u8>>,
    comment: Vec<u8>,
}

impl ZipWriter {
    pub fn new() -> ZipWriter {
        ZipWriter::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> ZipWriter {
        self.raw(name, 0, data, data.to_vec())
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> ZipWriter {
        self.raw(name, 8, data, deflate(data))
    }

    /// Entry with a bogus compression method
    ///
    /// The payload is deflated when `deflate_data` is set, stored otherwise.
    pub fn tampered(self, name: &str, method: u16, data: &[u8], deflate_data: bool) -> ZipWriter {
        let payload = if deflate_data {
            deflate(data)
        } else {
            data.to_vec()
        };

        self.raw(name, method, data, payload)
    }

    fn raw(mut self, name: &str, method: u16, data: &[u8], payload: Vec<u8>) -> ZipWriter {
        let mut crc = Crc::new();
        crc.update(data);

        self.entries.push(FixtureEntry {
            name: name.to_owned(),
            method,
            crc32: crc.sum(),
            uncompressed_size: data.len() as u32,
            payload,
        });
        self
    }

    pub fn signing_block(mut self, block: Vec<u8>) -> ZipWriter {
        self.signing_block = Some(block);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> ZipWriter {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(out.len() as u32);

            out.extend_from_slice(b"PK\x03\x04");
            put_u16(&mut out, 20);
            put_u16(&mut out, 0);
            put_u16(&mut out, entry.method);
            put_u32(&mut out, 0);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.payload.len() as u32);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.payload);
        }

        if let Some(block) = &self.signing_block {
            out.extend_from_slice(block);
        }

        let cd_start = out.len();
        for (entry, offset) in self.entries.iter().zip(offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            put_u16(&mut out, 20);
            put_u16(&mut out, 20);
            put_u16(&mut out, 0);
            put_u16(&mut out, entry.method);
            put_u32(&mut out, 0);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.payload.len() as u32);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            // extra, comment, disk, internal attributes
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u32(&mut out, offset);
            out.extend_from_slice(entry.name.as_bytes());
        }
        let cd_size = out.len() - cd_start;

        out.extend_from_slice(b"PK\x05\x06");
        put_u32(&mut out, 0);
        put_u16(&mut out, self.entries.len() as u16);
        put_u16(&mut out, self.entries.len() as u16);
        put_u32(&mut out, cd_size as u32);
        put_u32(&mut out, cd_start as u32);
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(data);
    out
}

/// APK signing block holding the given `(id, value)` pairs
pub fn signing_block(pairs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in pairs {
        body.extend_from_slice(&(value.len() as u64 + 4).to_le_bytes());
        body.extend_from_slice(&id.to_le_bytes());
        body.extend_from_slice(value);
    }

    let size = (body.len() + 8 + APK_SIGNING_BLOCK_MAGIC.len()) as u64;

    let mut out = size.to_le_bytes().to_vec();
    out.extend(body);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(APK_SIGNING_BLOCK_MAGIC);
    out
}

/// v2/v3 value with a single signer carrying `certificates`
///
/// Digests, attributes, signatures and the public key are left empty.
pub fn signer_block(certificates: &[&[u8]]) -> Vec<u8> {
    let certificates: Vec<u8> = certificates
        .iter()
        .flat_map(|der| length_prefixed(der))
        .collect();

    let mut signed_data = length_prefixed(&[]);
    signed_data.extend(length_prefixed(&certificates));
    signed_data.extend(length_prefixed(&[]));

    let mut signer = length_prefixed(&signed_data);
    signer.extend(length_prefixed(&[]));
    signer.extend(length_prefixed(&[]));

    length_prefixed(&length_prefixed(&signer))
}
