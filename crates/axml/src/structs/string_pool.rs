use apkparse_buffer::{BufferError, le_u16, le_u32, position, slice, u8, window};
use bitflags::bitflags;
use log::debug;
use winnow::prelude::*;

use crate::errors::ArscError;
use crate::structs::{ChunkHeader, ChunkType};

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct StringPoolFlags: u32 {
        /// If set, the string index is sorted by the string values (based on strcmp16())
        const SORTED = 1 << 0;

        /// String pool is encoded in UTF-8
        const UTF8 = 1 << 8;
    }
}

/// Definition for a pool of strings
///
/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=447
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPool {
    pub flags: StringPoolFlags,

    /// Declared count differs from the room left by `strings_start`
    pub tampered_count: bool,

    strings: Vec<String>,
}

impl StringPool {
    /// Fixed header size of a string pool chunk
    pub const HEADER_SIZE: usize = ChunkHeader::SIZE + 5 * 4;

    /// Decode a whole `STRING_POOL` chunk, `chunk` starts at its common header
    pub fn parse(chunk: &[u8]) -> Result<StringPool, BufferError> {
        let input = &mut &chunk[..];

        let header = ChunkHeader::parse(input)?;
        let (string_count, style_count, flags, strings_start, _styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        let header_size = header.header_size as usize;
        let chunk_size = (header.size as usize).min(chunk.len());
        let flags = StringPoolFlags::from_bits_truncate(flags);

        // the offset array must end where string data begins, malware likes to
        // inflate the declared count
        let mut count = string_count as usize;
        let mut tampered_count = false;
        if strings_start != 0 {
            let offsets_end = header_size.saturating_add(style_count as usize * 4);
            if let Some(room) = (strings_start as usize).checked_sub(offsets_end) {
                let calculated = room / 4;
                if calculated != count {
                    debug!(
                        "string pool declares {} strings, room for {}",
                        count, calculated
                    );
                    count = calculated;
                    tampered_count = true;
                }
            }
        }

        if count == 0 {
            return Ok(StringPool {
                flags,
                tampered_count,
                strings: Vec::new(),
            });
        }

        let offsets = window(chunk, header_size, count.saturating_mul(4))?;
        let data = match chunk.get(strings_start as usize..chunk_size) {
            Some(data) => data,
            None => {
                return Err(BufferError::Malformed(format!(
                    "string data starts at {} beyond chunk size {}",
                    strings_start, chunk_size
                )));
            }
        };

        let is_utf8 = flags.contains(StringPoolFlags::UTF8);
        let mut strings = Vec::with_capacity(count);

        for raw in offsets.chunks_exact(4) {
            let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
            let input = &mut position(data, offset).map_err(|_| {
                BufferError::Malformed(format!(
                    "string offset {} is outside of the {} bytes of string data",
                    offset,
                    data.len()
                ))
            })?;

            let string = if is_utf8 {
                Self::parse_utf8(input)
            } else {
                Self::parse_utf16(input)
            };

            strings.push(string.map_err(|e| match BufferError::from(e) {
                BufferError::Truncated { .. } => BufferError::Malformed(format!(
                    "string at offset {} runs past the string data",
                    offset
                )),
                other => other,
            })?);
        }

        Ok(StringPool {
            flags,
            tampered_count,
            strings,
        })
    }

    fn parse_utf16(input: &mut &[u8]) -> ModalResult<String> {
        let len = le_u16(input)?;

        let len = if len & 0x8000 != 0 {
            let low = le_u16(input)?;
            (((len & 0x7fff) as usize) << 16) | low as usize
        } else {
            len as usize
        };

        let raw = slice(input, len.saturating_mul(2))?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();

        Ok(String::from_utf16_lossy(&units))
    }

    fn parse_utf8(input: &mut &[u8]) -> ModalResult<String> {
        // utf-16 length first, unused
        let _ = Self::utf8_length(input)?;
        let len = Self::utf8_length(input)?;

        let raw = slice(input, len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    #[inline]
    fn utf8_length(input: &mut &[u8]) -> ModalResult<usize> {
        let first = u8(input)?;

        if first & 0x80 != 0 {
            let second = u8(input)?;
            Ok((((first & 0x7f) as usize) << 8) | second as usize)
        } else {
            Ok(first as usize)
        }
    }

    #[inline]
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    #[inline]
    pub fn is_utf8(&self) -> bool {
        self.flags.contains(StringPoolFlags::UTF8)
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.flags.contains(StringPoolFlags::SORTED)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Build a `STRING_POOL` chunk holding `strings` in order
    ///
    /// UTF-8 pools can hold at most 0x7fff units per string, UTF-16 pools 0x7fffffff.
    pub fn encode<S: AsRef<str>>(strings: &[S], utf8: bool) -> Result<Vec<u8>, ArscError> {
        let mut offsets = Vec::with_capacity(strings.len());
        let mut data = Vec::new();

        for string in strings {
            let string = string.as_ref();
            offsets.push(data.len() as u32);

            if utf8 {
                let units = string.encode_utf16().count();
                let bytes = string.as_bytes();
                if units > 0x7fff || bytes.len() > 0x7fff {
                    return Err(ArscError::StringTooLong(units.max(bytes.len())));
                }

                Self::write_utf8_length(&mut data, units);
                Self::write_utf8_length(&mut data, bytes.len());
                data.extend_from_slice(bytes);
                data.push(0);
            } else {
                let units: Vec<u16> = string.encode_utf16().collect();
                if units.len() > 0x7fff_ffff {
                    return Err(ArscError::StringTooLong(units.len()));
                }

                if units.len() > 0x7fff {
                    let len = units.len() as u32;
                    data.extend_from_slice(&(((len >> 16) as u16) | 0x8000).to_le_bytes());
                    data.extend_from_slice(&(len as u16).to_le_bytes());
                } else {
                    data.extend_from_slice(&(units.len() as u16).to_le_bytes());
                }

                for unit in units {
                    data.extend_from_slice(&unit.to_le_bytes());
                }
                data.extend_from_slice(&[0, 0]);
            }
        }

        // chunks are 4-byte aligned
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let strings_start = Self::HEADER_SIZE + offsets.len() * 4;
        let size = strings_start + data.len();
        let flags = if utf8 {
            StringPoolFlags::UTF8
        } else {
            StringPoolFlags::empty()
        };

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&ChunkType::StringPool.code().to_le_bytes());
        out.extend_from_slice(&(Self::HEADER_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&flags.bits().to_le_bytes());
        out.extend_from_slice(&(strings_start as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for offset in offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&data);

        Ok(out)
    }

    fn write_utf8_length(out: &mut Vec<u8>, len: usize) {
        if len > 0x7f {
            out.push(((len >> 8) as u8) | 0x80);
        }
        out.push(len as u8);
    }
}

impl FromIterator<String> for StringPool {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        StringPool {
            flags: StringPoolFlags::UTF8,
            tampered_count: false,
            strings: iter.into_iter().collect(),
        }
    }
}
