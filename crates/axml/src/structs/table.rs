use apkparse_buffer::{BufferError, le_u16, le_u32, position, slice, u8, utf16_fixed, window};
use bitflags::bitflags;
use log::{debug, warn};
use winnow::prelude::*;

use crate::structs::{Chunk, ChunkHeader, ResTableConfig, ResourceValue, StringPool, ValueType};

/// Header of a `TABLE_PACKAGE` chunk
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=919)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    /// If this is a base package, its ID
    ///
    /// 0 means this is a shared library, resolved at runtime
    pub id: u32,

    /// Actual name of this package, 128 UTF-16 code units, \0-terminated
    pub name: String,

    /// Offset to the type symbol table, relative to the package chunk
    pub type_strings: u32,

    /// Last index into `type_strings` that is for public use by others
    pub last_public_type: u32,

    /// Offset to the key symbol table, relative to the package chunk
    pub key_strings: u32,

    /// Last index into `key_strings` that is for public use by others
    pub last_public_key: u32,

    /// Missing in old versions of the structure - https://xrefandroid.com/android-4.4.4_r1/xref/frameworks/base/include/androidfw/ResourceTypes.h#782
    pub type_id_offset: u32,
}

impl PackageHeader {
    /// Header size with `type_id_offset`
    const SIZE: usize = ChunkHeader::SIZE + 4 + 256 + 4 * 5;

    pub fn parse(chunk: &Chunk<'_>) -> ModalResult<PackageHeader> {
        let input = &mut chunk.header_fields();

        let (id, name, type_strings, last_public_type, key_strings, last_public_key) = (
            le_u32,
            utf16_fixed(128),
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )
            .parse_next(input)?;

        // old structure does not have this field, larger ones are skipped by header_size
        let type_id_offset = if chunk.header.header_size as usize >= Self::SIZE {
            le_u32(input)?
        } else {
            0
        };

        if chunk.header.header_size as usize > Self::SIZE {
            warn!(
                "package header is {} bytes, skipped {} unknown bytes",
                chunk.header.header_size,
                chunk.header.header_size as usize - Self::SIZE
            );
        }

        Ok(PackageHeader {
            id,
            name,
            type_strings,
            last_public_type,
            key_strings,
            last_public_key,
            type_id_offset,
        })
    }
}

/// A specification of the resources defined by a particular type
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1448)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    /// The type identifier this chunk is holding, starts at 1
    pub id: u8,

    /// Used to be reserved, if >0 specifies the number of [`TableType`] entries for this spec
    pub types_count: u16,

    /// Configuration mask per entry, its length is the entry count of the type
    pub entry_flags: Vec<u32>,
}

impl TypeSpec {
    pub fn parse(chunk: &Chunk<'_>) -> ModalResult<TypeSpec> {
        let input = &mut chunk.header_fields();

        let (id, _res0, types_count, entry_count) = (u8, u8, le_u16, le_u32).parse_next(input)?;

        let raw = window(
            chunk.data,
            chunk.header.header_size as usize,
            (entry_count as usize).saturating_mul(4),
        )?;

        let entry_flags = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(TypeSpec {
            id,
            types_count,
            entry_flags,
        })
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entry_flags.len()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        /// If set, this is a complex entry, holding a set of name/value mappings.
        const COMPLEX = 0x0001;

        /// If set, this resource has been declared public, so libraries are allowed to reference it.
        const PUBLIC = 0x0002;

        /// If set, this is a weak resource and may be overridden by strong resources of the same name/type.
        const WEAK = 0x0004;

        /// If set, this is a compact entry with data type and value directly encoded in this entry.
        const COMPACT = 0x0008;

        /// If set, this entry relies on read/write Android feature flags.
        const USES_FEATURE_FLAGS = 0x0010;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        /// If set, the entry is sparse, and encodes both the entry ID and offset into each entry.
        const SPARSE = 0x01;

        /// If set, the offsets to the entries are encoded in 16-bit, real_offset = offset * 4u
        const OFFSET16 = 0x02;
    }
}

/// Value of a resource entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Simple(ResourceValue),

    /// Bag of name/value pairs, like a style
    Map {
        /// Resource identifier of the parent mapping, or 0 if there is none
        parent: u32,

        /// Pairs of attribute resource id and its value
        values: Vec<(u32, ResourceValue)>,
    },
}

/// One decoded entry of a [`TableType`]
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1583)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Name of the entry from the package key pool
    pub key: String,

    pub flags: EntryFlags,

    pub value: EntryValue,
}

impl ResourceEntry {
    /// Decode an entry at the start of `input`
    pub fn parse(input: &mut &[u8], key_strings: &StringPool) -> ModalResult<ResourceEntry> {
        let start = *input;
        let (size, raw_flags) = (le_u16, le_u16).parse_next(input)?;
        let flags = EntryFlags::from_bits_truncate(raw_flags);

        if flags.contains(EntryFlags::COMPACT) {
            // key index is stored in place of the size, type in the high byte of flags
            let data = le_u32(input)?;
            let data_type = ValueType::from((raw_flags >> 8) as u8);

            return Ok(ResourceEntry {
                key: key_strings.get(size as u32).unwrap_or_default().to_owned(),
                flags,
                value: EntryValue::Simple(ResourceValue::new(data_type, data)),
            });
        }

        let key = le_u32(input)?;
        let key = key_strings.get(key).unwrap_or_default().to_owned();

        // the value follows the entry header, whose size is declared
        let body = &mut position(start, size as usize)?;

        if flags.contains(EntryFlags::COMPLEX) {
            let (parent, count) = (le_u32, le_u32).parse_next(input)?;

            // each pair is a u32 name plus a Res_value
            let raw = slice(body, (count as usize).saturating_mul(4 + ResourceValue::SIZE))?;
            let values = raw
                .chunks_exact(4 + ResourceValue::SIZE)
                .map(|mut pair| -> ModalResult<(u32, ResourceValue)> {
                    let name = le_u32(&mut pair)?;
                    let value = ResourceValue::parse(&mut pair)?;
                    Ok((name, value))
                })
                .collect::<ModalResult<_>>()?;

            return Ok(ResourceEntry {
                key,
                flags,
                value: EntryValue::Map { parent, values },
            });
        }

        Ok(ResourceEntry {
            key,
            flags,
            value: EntryValue::Simple(ResourceValue::parse(body)?),
        })
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        matches!(self.value, EntryValue::Map { .. })
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.flags.contains(EntryFlags::PUBLIC)
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        self.flags.contains(EntryFlags::WEAK)
    }

    /// Simple value of the entry, `None` for maps
    #[inline]
    pub fn simple_value(&self) -> Option<&ResourceValue> {
        match &self.value {
            EntryValue::Simple(value) => Some(value),
            EntryValue::Map { .. } => None,
        }
    }
}

/// Offsets of the entries of a [`TableType`], relative to `entries_start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryIndex {
    /// Indexed by entry id, [`TableType::NO_ENTRY`] marks absent entries
    Dense(Vec<u32>),

    /// Sorted pairs of entry id and offset
    Sparse(Vec<(u16, u32)>),
}

/// A collection of resource entries for one type in one configuration
///
/// Keeps the raw entry bytes and decodes an entry only when it is requested.
///
/// [Source code](https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1500)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableType {
    /// The type identifier this chunk is holding, starts at 1
    pub id: u8,

    pub flags: TypeFlags,

    /// Configuration this collection of entries is designed for
    pub config: ResTableConfig,

    pub index: EntryIndex,

    /// Bytes from `entries_start` to the end of the chunk
    entries: Vec<u8>,
}

impl TableType {
    pub const NO_ENTRY: u32 = u32::MAX;

    pub fn parse(chunk: &Chunk<'_>) -> ModalResult<TableType> {
        let input = &mut chunk.header_fields();

        let (id, flags, _reserved, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(input)?;
        let flags = TypeFlags::from_bits_truncate(flags);
        let config = ResTableConfig::parse(input)?;

        let header_size = chunk.header.header_size as usize;
        let entry_count = entry_count as usize;

        let index = if flags.contains(TypeFlags::SPARSE) {
            let raw = window(chunk.data, header_size, entry_count.saturating_mul(4))?;
            let pairs = raw
                .chunks_exact(4)
                .map(|c| {
                    let idx = u16::from_le_bytes([c[0], c[1]]);
                    let offset = u16::from_le_bytes([c[2], c[3]]) as u32 * 4;
                    (idx, offset)
                })
                .collect();

            EntryIndex::Sparse(pairs)
        } else if flags.contains(TypeFlags::OFFSET16) {
            let raw = window(chunk.data, header_size, entry_count.saturating_mul(2))?;
            let offsets = raw
                .chunks_exact(2)
                .map(|c| match u16::from_le_bytes([c[0], c[1]]) {
                    u16::MAX => Self::NO_ENTRY,
                    offset => offset as u32 * 4,
                })
                .collect();

            EntryIndex::Dense(offsets)
        } else {
            let raw = window(chunk.data, header_size, entry_count.saturating_mul(4))?;
            let offsets = raw
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();

            EntryIndex::Dense(offsets)
        };

        let entries = position(chunk.data, entries_start as usize)?.to_vec();

        Ok(TableType {
            id,
            flags,
            config,
            index,
            entries,
        })
    }

    /// Offset of `entry_id` inside the entries block, if the entry exists in this config
    pub fn offset_of(&self, entry_id: u16) -> Option<u32> {
        match &self.index {
            EntryIndex::Dense(offsets) => offsets
                .get(entry_id as usize)
                .copied()
                .filter(|&offset| offset != Self::NO_ENTRY),
            EntryIndex::Sparse(pairs) => pairs
                .binary_search_by_key(&entry_id, |&(idx, _)| idx)
                .ok()
                .map(|i| pairs[i].1),
        }
    }

    /// Decode the entry `entry_id`, `None` if it is absent or unreadable
    pub fn entry(&self, entry_id: u16, key_strings: &StringPool) -> Option<ResourceEntry> {
        let offset = self.offset_of(entry_id)?;

        let result = position(&self.entries, offset as usize)
            .and_then(|mut input| ResourceEntry::parse(&mut input, key_strings));

        match result {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    "can't decode entry {} of type {} ({}): {}",
                    entry_id,
                    self.id,
                    self.config,
                    BufferError::from(e)
                );
                None
            }
        }
    }

    /// Ids of all entries present in this configuration
    pub fn entry_ids(&self) -> Vec<u16> {
        match &self.index {
            EntryIndex::Dense(offsets) => offsets
                .iter()
                .enumerate()
                .filter(|(_, offset)| **offset != Self::NO_ENTRY)
                .map(|(idx, _)| idx as u16)
                .collect(),
            EntryIndex::Sparse(pairs) => pairs.iter().map(|(idx, _)| *idx).collect(),
        }
    }
}

/// A shared library package-id to package name entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// The package id this shared library was assigned at build time
    pub package_id: u32,

    pub package_name: String,
}

impl LibraryEntry {
    pub fn parse_all(chunk: &Chunk<'_>) -> ModalResult<Vec<LibraryEntry>> {
        let count = le_u32(&mut chunk.header_fields())?;
        let body = &mut chunk.body();

        let mut entries = Vec::new();
        for _ in 0..count {
            let (package_id, package_name) = (le_u32, utf16_fixed(128)).parse_next(body)?;
            debug!("shared library 0x{:02x} {}", package_id, package_name);

            entries.push(LibraryEntry {
                package_id,
                package_name,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::structs::Chunks;

    fn first_chunk(data: &[u8]) -> Chunk<'_> {
        Chunks::new(data, 0).next().unwrap().unwrap()
    }

    fn keys() -> StringPool {
        ["app_name", "icon", "style"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn parses_type_spec() {
        let data = type_spec(2, 5);
        let spec = TypeSpec::parse(&first_chunk(&data)).unwrap();

        assert_eq!(spec.id, 2);
        assert_eq!(spec.entry_count(), 5);
    }

    #[test]
    fn type_spec_with_huge_count_is_truncated() {
        let mut data = type_spec(1, 1);
        data[12..16].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = TypeSpec::parse(&first_chunk(&data)).unwrap_err();
        assert!(BufferError::from(err).is_truncated());
    }

    #[test]
    fn dense_entries_are_lazy() {
        let data = table_type(
            1,
            "",
            "",
            0,
            &[
                Some(simple_entry(0, 0x03, 7)),
                None,
                Some(simple_entry(1, 0x12, 1)),
            ],
        );
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();

        assert_eq!(table_type.entry_ids(), vec![0, 2]);
        assert_eq!(table_type.offset_of(1), None);
        assert_eq!(table_type.offset_of(3), None);

        let entry = table_type.entry(2, &keys()).unwrap();
        assert_eq!(entry.key, "icon");
        assert_eq!(
            entry.simple_value(),
            Some(&ResourceValue::new(ValueType::Boolean, 1))
        );
    }

    #[test]
    fn sparse_entries() {
        let data = sparse_table_type(
            1,
            &[(3, simple_entry(0, 0x10, 42)), (9, simple_entry(1, 0x10, 43))],
        );
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();

        assert_eq!(table_type.entry_ids(), vec![3, 9]);
        assert_eq!(table_type.entry(0, &keys()), None);

        let entry = table_type.entry(9, &keys()).unwrap();
        assert_eq!(entry.simple_value().map(|v| v.data), Some(43));
    }

    #[test]
    fn map_entry_values() {
        let data = table_type(
            1,
            "",
            "",
            0,
            &[Some(map_entry(2, 0x01030000, &[(0x01010000, 0x10, 1), (0x01010001, 0x12, 0)]))],
        );
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();
        let entry = table_type.entry(0, &keys()).unwrap();

        assert!(entry.is_complex());
        assert_eq!(entry.key, "style");
        match entry.value {
            EntryValue::Map { parent, values } => {
                assert_eq!(parent, 0x01030000);
                assert_eq!(values.len(), 2);
                assert_eq!(values[1].0, 0x01010001);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn compact_entry() {
        let mut entry = Vec::new();
        entry.extend_from_slice(&1u16.to_le_bytes());
        entry.extend_from_slice(&(EntryFlags::COMPACT.bits() | 0x1000).to_le_bytes());
        entry.extend_from_slice(&5u32.to_le_bytes());

        let data = table_type(1, "", "", 0, &[Some(entry)]);
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();
        let entry = table_type.entry(0, &keys()).unwrap();

        assert_eq!(entry.key, "icon");
        assert_eq!(
            entry.simple_value(),
            Some(&ResourceValue::new(ValueType::Dec, 5))
        );
        assert!(entry.flags.contains(EntryFlags::COMPACT));
    }

    #[test]
    fn compact_entry_keeps_type_byte() {
        let mut entry = Vec::new();
        entry.extend_from_slice(&0u16.to_le_bytes());
        entry.extend_from_slice(&(EntryFlags::COMPACT.bits() | EntryFlags::PUBLIC.bits() | 0x0300).to_le_bytes());
        entry.extend_from_slice(&7u32.to_le_bytes());

        let data = table_type(1, "", "", 0, &[Some(entry)]);
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();
        let entry = table_type.entry(0, &keys()).unwrap();

        assert!(entry.is_public());
        assert_eq!(
            entry.simple_value(),
            Some(&ResourceValue::new(ValueType::String, 7))
        );
    }

    #[test]
    fn broken_entry_is_absent() {
        let data = table_type(1, "", "", 0, &[Some(vec![8, 0, 0])]);
        let table_type = TableType::parse(&first_chunk(&data)).unwrap();

        assert_eq!(table_type.entry_ids(), vec![0]);
        assert_eq!(table_type.entry(0, &keys()), None);
    }

    #[test]
    fn package_header_name() {
        let data = package(0x7f, "com.example", &["string"], &["app_name"], &[]);
        let header = PackageHeader::parse(&first_chunk(&data)).unwrap();

        assert_eq!(header.id, 0x7f);
        assert_eq!(header.name, "com.example");
        assert_eq!(header.type_strings as usize, PackageHeader::SIZE);
    }
}
