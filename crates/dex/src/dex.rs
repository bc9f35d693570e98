use std::borrow::Cow;

use apkparse_buffer::{BufferError, Interrupt, corrupt, le_u32, slice, u8, window};
use bitflags::bitflags;
use log::{debug, warn};
use simd_adler32::Adler32;
use winnow::prelude::*;

use crate::class::DexClass;
use crate::errors::DexError;

/// The constant is used to indicate the endiannes of the file in whic it is found.
///
/// This constant means - little-endian.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#endian-constant>
pub const ENDIAN_CONSTANT: u32 = 0x12345678;

/// The constant is used to indicate the endiannes of the file in whic it is found.
///
/// This constant means - big-endian.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#endian-constant>
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;

/// The constant is used to indicate that an index value is absent.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#no-index>
pub const NO_INDEX: u32 = u32::MAX;

/// Magic at the start of every dex file, followed by a 3-digit version and NUL
pub const DEX_MAGIC: &[u8; 4] = b"dex\n";

/// Size of `class_def_item`
const CLASS_DEF_SIZE: usize = 0x20;

/// Dex file with the tables needed to name its classes
///
/// Strings are decoded on demand from the string data section.
#[derive(Debug)]
pub struct Dex {
    /// Store data of dex file inside this structure
    data: Vec<u8>,

    /// Information about dex header
    pub header: DexHeader,

    /// Offsets of string data items
    string_ids: Vec<u32>,

    /// Indexes into `string_ids` of type descriptors
    type_ids: Vec<u32>,

    class_defs: Vec<ClassItem>,
}

impl Dex {
    /// Parse given dex file
    ///
    /// ```ignore
    /// let dex = Dex::new(data)?;
    /// ```
    pub fn new(data: Vec<u8>) -> Result<Dex, DexError> {
        let header = DexHeader::parse(&data)?;

        let string_ids = read_ids(
            &data,
            header.string_ids_off,
            header.string_ids_size,
            "string ids",
        )?;
        let type_ids = read_ids(&data, header.type_ids_off, header.type_ids_size, "type ids")?;

        let raw = window(
            &data,
            header.class_defs_off as usize,
            (header.class_defs_size as usize).saturating_mul(CLASS_DEF_SIZE),
        )
        .map_err(|e| DexError::Section {
            section: "class defs",
            source: BufferError::from(e),
        })?;

        let mut class_defs = Vec::with_capacity(header.class_defs_size as usize);
        for mut record in raw.chunks_exact(CLASS_DEF_SIZE) {
            let item = ClassItem::parse(&mut record).map_err(|e| DexError::Section {
                section: "class defs",
                source: BufferError::from(e),
            })?;
            class_defs.push(item);
        }

        debug!(
            "dex {:?}: {} strings, {} types, {} classes",
            header.version,
            string_ids.len(),
            type_ids.len(),
            class_defs.len()
        );

        Ok(Dex {
            data,
            header,
            string_ids,
            type_ids,
            class_defs,
        })
    }

    /// Compare the Adler-32 checksum of the file with the one stored in the header
    pub fn verify_checksum(&self) -> Result<(), DexError> {
        let mut adler = Adler32::new();
        // checksum covers everything but the magic and the checksum itself
        adler.write(self.data.get(12..).unwrap_or_default());
        let actual = adler.finish();

        if actual != self.header.checksum {
            return Err(DexError::ChecksumMismatch {
                expected: self.header.checksum,
                actual,
            });
        }

        Ok(())
    }

    pub fn string_count(&self) -> usize {
        self.string_ids.len()
    }

    pub fn class_defs(&self) -> &[ClassItem] {
        &self.class_defs
    }

    /// String at `idx` decoded from modified UTF-8
    pub fn get_string(&self, idx: usize) -> Option<Cow<'_, str>> {
        let offset = *self.string_ids.get(idx)? as usize;
        let mut data = self.data.get(offset..)?;

        // the prefix is the length in utf-16 units, not bytes
        let _utf16_size = uleb128(&mut data).ok()?;

        // string data is NUL terminated, MUTF-8 never contains a raw NUL
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());

        Some(simd_cesu8::mutf8::decode_lossy(&data[..end]))
    }

    #[inline]
    pub fn get_type(&self, idx: usize) -> Option<Cow<'_, str>> {
        let idx = *self.type_ids.get(idx)?;
        self.get_string(idx as usize)
    }

    /// Name every class of the file, in class def order
    ///
    /// Classes whose descriptor can't be resolved are skipped.
    pub fn classes(&self, interrupt: &Interrupt) -> Result<Vec<DexClass>, DexError> {
        let mut classes = Vec::with_capacity(self.class_defs.len());

        for (idx, item) in self.class_defs.iter().enumerate() {
            interrupt.check().map_err(|_| DexError::Interrupted)?;

            let Some(class_type) = item.get_name(self) else {
                warn!(
                    "class def {} has bad type index {}, skipped",
                    idx, item.class_idx
                );
                continue;
            };

            let super_class = item.get_superclass(self);
            if super_class.is_none() && item.superclass_idx != NO_INDEX {
                warn!(
                    "class {} has bad superclass index {}",
                    class_type, item.superclass_idx
                );
            }

            classes.push(DexClass {
                class_type: class_type.into_owned(),
                super_class: super_class.map(Cow::into_owned),
                access_flags: item.access_flags.bits(),
            });
        }

        Ok(classes)
    }
}

fn read_ids(
    data: &[u8],
    offset: u32,
    count: u32,
    section: &'static str,
) -> Result<Vec<u32>, DexError> {
    let raw = window(data, offset as usize, (count as usize).saturating_mul(4)).map_err(|e| {
        DexError::Section {
            section,
            source: BufferError::from(e),
        }
    })?;

    Ok(raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Unsigned LEB128 of at most 5 bytes
#[inline]
fn uleb128(input: &mut &[u8]) -> ModalResult<u32> {
    let mut val = 0u32;

    for shift in (0..35).step_by(7) {
        let byte = u8(input)?;
        val |= ((byte & 0x7f) as u32) << shift;

        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }

    Err(corrupt())
}

/// Known dex versions
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#dex-file-magic>
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DexVersion {
    #[default]
    DEX35,
    DEX36,
    DEX37,
    DEX38,
    DEX39,
    DEX40,
    DEX41,
}

impl TryFrom<u16> for DexVersion {
    type Error = DexError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            35 => Ok(DexVersion::DEX35),
            36 => Ok(DexVersion::DEX36),
            37 => Ok(DexVersion::DEX37),
            38 => Ok(DexVersion::DEX38),
            39 => Ok(DexVersion::DEX39),
            40 => Ok(DexVersion::DEX40),
            41 => Ok(DexVersion::DEX41),
            _ => Err(DexError::UnknownVersion(value)),
        }
    }
}

impl From<DexVersion> for u32 {
    fn from(value: DexVersion) -> Self {
        match value {
            DexVersion::DEX35 => 35,
            DexVersion::DEX36 => 36,
            DexVersion::DEX37 => 37,
            DexVersion::DEX38 => 38,
            DexVersion::DEX39 => 39,
            DexVersion::DEX40 => 40,
            DexVersion::DEX41 => 41,
        }
    }
}

/// Fields of `header_item` used to locate the id tables
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#header-item>
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DexHeader {
    /// Known dex version
    pub version: DexVersion,

    /// Adler32 checksum of the file
    ///
    /// Used to detect file corruption
    pub checksum: u32,

    /// SHA-1 signature of the file
    ///
    /// Used to uniquely identify files
    pub signature: [u8; 20],

    /// Size of the entire file (including the header) in bytes
    pub file_size: u32,

    /// Size of the header (this entire section) in bytes
    pub header_size: u32,

    /// Count of strings in the string identifiers list
    pub string_ids_size: u32,

    /// Offset from the start of the file to the string identifiers list
    pub string_ids_off: u32,

    /// Count of elements in the type identifiers list, at most 65535
    pub type_ids_size: u32,

    /// Offset from the start of the file to the type identifiers list
    pub type_ids_off: u32,

    /// Count of elements in the class definitions list
    pub class_defs_size: u32,

    /// Offset from the start of the file to the class definitions list
    pub class_defs_off: u32,
}

impl DexHeader {
    /// Size of the header written by every known version
    pub const SIZE: usize = 0x70;

    fn parse(data: &[u8]) -> Result<DexHeader, DexError> {
        let input = &mut &data[..];
        let section = |e| DexError::Section {
            section: "header",
            source: BufferError::from(e),
        };

        let magic = slice(input, 8).map_err(section)?;
        if &magic[..4] != DEX_MAGIC || magic[7] != 0 {
            return Err(DexError::InvalidHeader);
        }

        let digits = std::str::from_utf8(&magic[4..7]).map_err(|_| DexError::InvalidHeader)?;
        let version: u16 = digits.parse().map_err(|_| DexError::InvalidHeader)?;
        let version = DexVersion::try_from(version)?;

        let checksum = le_u32(input).map_err(section)?;
        let mut signature = [0u8; 20];
        signature.copy_from_slice(slice(input, 20).map_err(section)?);

        let (file_size, header_size, endian_tag) =
            (le_u32, le_u32, le_u32).parse_next(input).map_err(section)?;

        match endian_tag {
            ENDIAN_CONSTANT => {}
            REVERSE_ENDIAN_CONSTANT => return Err(DexError::BigEndian),
            _ => return Err(DexError::InvalidHeader),
        }

        // link_size, link_off, map_off
        slice(input, 12).map_err(section)?;

        let (string_ids_size, string_ids_off, type_ids_size, type_ids_off) =
            (le_u32, le_u32, le_u32, le_u32)
                .parse_next(input)
                .map_err(section)?;

        if type_ids_size > u16::MAX as u32 {
            return Err(DexError::InvalidHeader);
        }

        // proto, field and method ids
        slice(input, 24).map_err(section)?;

        let (class_defs_size, class_defs_off) = (le_u32, le_u32).parse_next(input).map_err(section)?;

        // data_size, data_off
        slice(input, 8).map_err(section)?;

        Ok(DexHeader {
            version,
            checksum,
            signature,
            file_size,
            header_size,
            string_ids_size,
            string_ids_off,
            type_ids_size,
            type_ids_off,
            class_defs_size,
            class_defs_off,
        })
    }
}

/// Abstraction over `class_def_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#class-def-item>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassItem {
    /// Index into the type ids list for this class
    pub class_idx: u32,

    /// Access flags for the class
    pub access_flags: AccessFlags,

    /// Index into the type ids list for the superclass
    ///
    /// [NO_INDEX] - if this class has no superclass  (i.e., it is a root class such as `Object`)
    pub superclass_idx: u32,

    /// Index into the string ids list for the name of the source file
    ///
    /// [NO_INDEX] - lack of this information
    pub source_file_idx: u32,
}

impl ClassItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<ClassItem> {
        let (class_idx, access_flags, superclass_idx, _interfaces_off, source_file_idx) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        Ok(ClassItem {
            class_idx,
            access_flags: AccessFlags::from_bits_retain(access_flags),
            superclass_idx,
            source_file_idx,
        })
    }

    /// Get class name
    #[inline]
    pub fn get_name<'a>(&'a self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    /// Get superclass for this class
    #[inline]
    pub fn get_superclass<'a>(&'a self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        if self.superclass_idx == NO_INDEX {
            return None;
        }

        dex.get_type(self.superclass_idx as usize)
    }

    /// Get source file for this class
    #[inline]
    pub fn get_source_file<'a>(&'a self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        if self.source_file_idx == NO_INDEX {
            return None;
        }

        dex.get_string(self.source_file_idx as usize)
    }
}

bitflags! {
    /// Access flags of a class definition
    ///
    /// See: <https://source.android.com/docs/core/runtime/dex-format#access-flags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// `ACC_PUBLIC (0x0001)`: Visible everywhere.
        const PUBLIC = 0x0001;

        /// `ACC_PRIVATE (0x0002)`: Only allowed on inner classes.
        const PRIVATE = 0x0002;

        /// `ACC_PROTECTED (0x0004)`: Only allowed on inner classes.
        const PROTECTED = 0x0004;

        /// `ACC_STATIC (0x0008)`: Inner class not constructed with an outer `this`.
        const STATIC = 0x0008;

        /// `ACC_FINAL (0x0010)`: Not subclassable.
        const FINAL = 0x0010;

        /// `ACC_INTERFACE (0x0200)`: Class is an interface.
        const INTERFACE = 0x0200;

        /// `ACC_ABSTRACT (0x0400)`: Not directly instantiable.
        const ABSTRACT = 0x0400;

        /// `ACC_SYNTHETIC (0x1000)`: Compiler generated.
        const SYNTHETIC = 0x1000;

        /// `ACC_ANNOTATION (0x2000)`: Declares an annotation class.
        const ANNOTATION = 0x2000;

        /// `ACC_ENUM (0x4000)`: Enum type.
        const ENUM = 0x4000;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::fixtures::DexWriter;

    fn sample() -> Vec<u8> {
        DexWriter::new()
            .class("Lcom/example/Main;", Some("Landroid/app/Activity;"), 0x0001)
            .class("Lcom/example/Kind;", Some("Ljava/lang/Enum;"), 0x4011)
            .class("Ljava/lang/Object;", None, 0x0001)
            .build()
    }

    #[test]
    fn parses_header() {
        let dex = Dex::new(sample()).unwrap();

        assert_eq!(dex.header.version, DexVersion::DEX35);
        assert_eq!(dex.header.header_size, DexHeader::SIZE as u32);
        assert_eq!(dex.class_defs().len(), 3);
        assert!(dex.verify_checksum().is_ok());
    }

    #[test]
    fn names_classes() {
        let dex = Dex::new(sample()).unwrap();
        let classes = dex.classes(&Interrupt::none()).unwrap();

        assert_eq!(classes.len(), 3);
        assert_eq!(classes[0].class_type, "Lcom/example/Main;");
        assert_eq!(classes[0].super_class.as_deref(), Some("Landroid/app/Activity;"));
        assert!(classes[1].is_enum());
        assert_eq!(classes[2].super_class, None);
    }

    #[test]
    fn modified_utf8_strings() {
        let data = DexWriter::new()
            .class("Lcom/example/Caf\u{e9};", None, 0)
            .build();
        let dex = Dex::new(data).unwrap();

        assert_eq!(
            dex.classes(&Interrupt::none()).unwrap()[0].class_type,
            "Lcom/example/Caf\u{e9};"
        );
    }

    #[test]
    fn checksum_mismatch() {
        let mut data = sample();
        let last = data.len() - 1;
        data[last] ^= 0xff;

        let dex = Dex::new(data).unwrap();
        assert!(matches!(
            dex.verify_checksum(),
            Err(DexError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut data = sample();
        data[0] = b'x';
        assert_eq!(Dex::new(data).unwrap_err(), DexError::InvalidHeader);

        let mut data = sample();
        data[4..7].copy_from_slice(b"034");
        assert_eq!(Dex::new(data).unwrap_err(), DexError::UnknownVersion(34));

        let mut data = sample();
        data[4..7].copy_from_slice(b"041");
        assert_eq!(Dex::new(data).unwrap().header.version, DexVersion::DEX41);
    }

    #[test]
    fn rejects_big_endian() {
        let mut data = sample();
        data[40..44].copy_from_slice(&REVERSE_ENDIAN_CONSTANT.to_le_bytes());

        assert_eq!(Dex::new(data).unwrap_err(), DexError::BigEndian);
    }

    #[test]
    fn bad_type_index_is_skipped() {
        let mut data = sample();
        let header = DexHeader::parse(&data).unwrap();

        // class_idx of the first class def
        let offset = header.class_defs_off as usize;
        data[offset..offset + 4].copy_from_slice(&0xffffu32.to_le_bytes());

        let classes = Dex::new(data).unwrap().classes(&Interrupt::none()).unwrap();
        assert_eq!(classes.len(), 2);
    }

    #[test]
    fn interrupt_stops_enumeration() {
        let dex = Dex::new(sample()).unwrap();
        let interrupt = Interrupt::new(Arc::new(AtomicBool::new(true)));

        assert_eq!(dex.classes(&interrupt).unwrap_err(), DexError::Interrupted);
    }

    #[test]
    fn uleb128_is_capped() {
        assert_eq!(uleb128(&mut &[0x7f][..]).ok(), Some(0x7f));
        assert_eq!(uleb128(&mut &[0x80, 0x01][..]).ok(), Some(0x80));
        assert!(uleb128(&mut &[0xff, 0xff, 0xff, 0xff, 0xff, 0x01][..]).is_err());
    }

    #[test]
    fn truncated_file_never_panics() {
        let data = sample();

        for end in 0..data.len() {
            if let Ok(dex) = Dex::new(data[..end].to_vec()) {
                let _ = dex.classes(&Interrupt::none());
            }
        }

        let err = Dex::new(data[..0x40].to_vec()).unwrap_err();
        assert!(err.is_truncated());
    }
}
