use apkparse_buffer::{BufferError, le_u16, le_u32, position, slice};
use log::warn;
use winnow::prelude::*;

use crate::structs::EndOfCentralDirectory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub general_purpose: u16,
    pub compression_method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    pub file_name: String,
}

impl CentralDirectoryEntry {
    pub const MAGIC: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];

    fn parse(input: &mut &[u8]) -> ModalResult<CentralDirectoryEntry> {
        // magic, version made by, version needed
        slice(input, 8)?;

        let (general_purpose, compression_method, _time, _date) =
            (le_u16, le_u16, le_u16, le_u16).parse_next(input)?;
        let (crc32, compressed_size, uncompressed_size) =
            (le_u32, le_u32, le_u32).parse_next(input)?;
        let (file_name_length, extra_field_length, file_comment_length) =
            (le_u16, le_u16, le_u16).parse_next(input)?;

        // disk number start, internal and external attributes
        slice(input, 8)?;
        let local_header_offset = le_u32(input)?;

        let file_name = slice(input, file_name_length as usize)?;
        slice(input, extra_field_length as usize + file_comment_length as usize)?;

        Ok(CentralDirectoryEntry {
            general_purpose,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            file_name: String::from_utf8_lossy(file_name).into_owned(),
        })
    }
}

/// Entries of the central directory in archive order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentralDirectory {
    pub entries: Vec<CentralDirectoryEntry>,
}

impl CentralDirectory {
    /// Read records from the offset given by `eocd` until the signature stops matching
    ///
    /// The declared entry count is not trusted, tampered archives lie about it.
    pub fn parse(input: &[u8], eocd: &EndOfCentralDirectory) -> Result<CentralDirectory, BufferError> {
        let mut input = position(input, eocd.central_dir_offset as usize)?;

        let mut entries = Vec::new();
        while input.starts_with(&CentralDirectoryEntry::MAGIC) {
            match CentralDirectoryEntry::parse(&mut input) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("central directory entry {} is broken: {}", entries.len(), BufferError::from(e));
                    break;
                }
            }
        }

        if entries.len() != eocd.total_entries as usize {
            warn!(
                "eocd declares {} entries, central directory has {}",
                eocd.total_entries,
                entries.len()
            );
        }

        Ok(CentralDirectory { entries })
    }
}
