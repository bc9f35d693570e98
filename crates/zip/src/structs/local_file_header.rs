use apkparse_buffer::{le_u16, le_u32, position, slice};
use winnow::prelude::*;

/// Local file header in front of every entry's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub general_purpose_bit_flag: u16,
    pub compression_method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

    pub fn parse(input: &[u8], offset: usize) -> ModalResult<LocalFileHeader> {
        let input = &mut position(input, offset)?;

        // magic and version needed
        slice(input, 6)?;

        let (general_purpose_bit_flag, compression_method, _time, _date) =
            (le_u16, le_u16, le_u16, le_u16).parse_next(input)?;
        let (crc32, compressed_size, uncompressed_size, file_name_length, extra_field_length) =
            (le_u32, le_u32, le_u32, le_u16, le_u16).parse_next(input)?;

        Ok(LocalFileHeader {
            general_purpose_bit_flag,
            compression_method,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
        })
    }

    /// Get structure size
    ///
    /// 4 (MAGIC) + 26 (DATA) + file_name length + extra field length
    #[inline]
    pub fn size(&self) -> usize {
        30 + self.file_name_length as usize + self.extra_field_length as usize
    }
}
