//! Writer of minimal dex files.
//!
//! Only built for tests and for crates that enable the `fixtures` feature.

use simd_adler32::Adler32;

use crate::dex::{DexHeader, ENDIAN_CONSTANT, NO_INDEX};

/// Builder of a dex file holding only class definitions
#[derive(Debug, Clone, Default)]
pub struct DexWriter {
    strings: Vec<String>,
    classes: Vec<(u32, Option<u32>, u32)>,
}

impl DexWriter {
    pub fn new() -> DexWriter {
        DexWriter::default()
    }

    fn intern(&mut self, descriptor: &str) -> u32 {
        match self.strings.iter().position(|s| s == descriptor) {
            Some(idx) => idx as u32,
            None => {
                self.strings.push(descriptor.to_owned());
                self.strings.len() as u32 - 1
            }
        }
    }

    pub fn class(mut self, descriptor: &str, super_class: Option<&str>, access_flags: u32) -> DexWriter {
        let class_idx = self.intern(descriptor);
        let super_idx = super_class.map(|s| self.intern(s));
        self.classes.push((class_idx, super_idx, access_flags));
        self
    }

    /// Serialize with a valid checksum, every string is also a type
    pub fn build(&self) -> Vec<u8> {
        let count = self.strings.len() as u32;
        let string_ids_off = DexHeader::SIZE as u32;
        let type_ids_off = string_ids_off + count * 4;
        let class_defs_off = type_ids_off + count * 4;
        let data_off = class_defs_off + self.classes.len() as u32 * 0x20;

        let mut string_data = Vec::new();
        let mut string_ids = Vec::new();
        for s in &self.strings {
            string_ids.extend_from_slice(&(data_off + string_data.len() as u32).to_le_bytes());

            let mut units = s.encode_utf16().count() as u32;
            loop {
                let byte = (units & 0x7f) as u8;
                units >>= 7;
                if units == 0 {
                    string_data.push(byte);
                    break;
                }
                string_data.push(byte | 0x80);
            }
            string_data.extend_from_slice(s.as_bytes());
            string_data.push(0);
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"dex\n035\0");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);

        let file_size = data_off + string_data.len() as u32;
        for value in [
            file_size,
            DexHeader::SIZE as u32,
            ENDIAN_CONSTANT,
            0,
            0,
            0,
            count,
            string_ids_off,
            count,
            type_ids_off,
            0,
            0,
            0,
            0,
            0,
            0,
            self.classes.len() as u32,
            class_defs_off,
            string_data.len() as u32,
            data_off,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        out.extend(string_ids);
        for idx in 0..count {
            out.extend_from_slice(&idx.to_le_bytes());
        }

        for (class_idx, super_idx, access_flags) in &self.classes {
            for value in [
                *class_idx,
                *access_flags,
                super_idx.unwrap_or(NO_INDEX),
                0,
                NO_INDEX,
                0,
                0,
                0,
            ] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out.extend(string_data);

        let mut adler = Adler32::new();
        adler.write(&out[12..]);
        let checksum = adler.finish();
        out[8..12].copy_from_slice(&checksum.to_le_bytes());

        out
    }
}
