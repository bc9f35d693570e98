use apkparse_buffer::{BufferError, le_u16, le_u32, slice};
use winnow::prelude::*;

/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=237
#[derive(Debug, Clone, Copy, PartialEq, Default, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum ChunkType {
    #[default]
    Null = 0x0000,
    StringPool = 0x0001,
    Table = 0x0002,
    Xml = 0x0003,

    // Chunk types in XmlType
    XmlStartNamespace = 0x0100,
    XmlEndNamespace = 0x0101,
    XmlStartElement = 0x0102,
    XmlEndElement = 0x0103,
    XmlCdata = 0x0104,
    XmlLastChunk = 0x017f,
    XmlResourceMap = 0x0180,

    // Chunk types in TableType
    TablePackage = 0x0200,
    TableType = 0x0201,
    TableTypeSpec = 0x0202,
    TableLibrary = 0x0203,
    TableOverlayable = 0x0204,
    TableOverlayablePolicy = 0x0205,
    TableStagedAlias = 0x0206,

    Unknown(u16),
}

impl From<u16> for ChunkType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ChunkType::Null,
            0x0001 => ChunkType::StringPool,
            0x0002 => ChunkType::Table,
            0x0003 => ChunkType::Xml,
            0x0100 => ChunkType::XmlStartNamespace,
            0x0101 => ChunkType::XmlEndNamespace,
            0x0102 => ChunkType::XmlStartElement,
            0x0103 => ChunkType::XmlEndElement,
            0x0104 => ChunkType::XmlCdata,
            0x017f => ChunkType::XmlLastChunk,
            0x0180 => ChunkType::XmlResourceMap,
            0x0200 => ChunkType::TablePackage,
            0x0201 => ChunkType::TableType,
            0x0202 => ChunkType::TableTypeSpec,
            0x0203 => ChunkType::TableLibrary,
            0x0204 => ChunkType::TableOverlayable,
            0x0205 => ChunkType::TableOverlayablePolicy,
            0x0206 => ChunkType::TableStagedAlias,
            other => ChunkType::Unknown(other),
        }
    }
}

impl ChunkType {
    /// Raw `type` field of the chunk header
    pub fn code(&self) -> u16 {
        match self {
            ChunkType::Null => 0x0000,
            ChunkType::StringPool => 0x0001,
            ChunkType::Table => 0x0002,
            ChunkType::Xml => 0x0003,
            ChunkType::XmlStartNamespace => 0x0100,
            ChunkType::XmlEndNamespace => 0x0101,
            ChunkType::XmlStartElement => 0x0102,
            ChunkType::XmlEndElement => 0x0103,
            ChunkType::XmlCdata => 0x0104,
            ChunkType::XmlLastChunk => 0x017f,
            ChunkType::XmlResourceMap => 0x0180,
            ChunkType::TablePackage => 0x0200,
            ChunkType::TableType => 0x0201,
            ChunkType::TableTypeSpec => 0x0202,
            ChunkType::TableLibrary => 0x0203,
            ChunkType::TableOverlayable => 0x0204,
            ChunkType::TableOverlayablePolicy => 0x0205,
            ChunkType::TableStagedAlias => 0x0206,
            ChunkType::Unknown(code) => *code,
        }
    }

    /// Node chunks of a binary xml document
    #[inline]
    pub fn is_xml_node(&self) -> bool {
        *self >= ChunkType::XmlStartNamespace && *self <= ChunkType::XmlLastChunk
    }
}

/// Header that appears at the front of every data chunk in a resource
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=220
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Type identifier for this chunk. The meaning of this value depends on the containing chunk.
    pub kind: ChunkType,

    /// Size of the chunk header (in bytes).  Adding this value to
    /// the address of the chunk allows you to find its associated data
    /// (if any).
    pub header_size: u16,

    /// Total size of this chunk (in bytes), including any child chunks.
    pub size: u32,
}

impl ChunkHeader {
    /// Size of the common header, every chunk starts with it
    pub const SIZE: usize = 2 + 2 + 4;

    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(kind, header_size, size)| ChunkHeader {
                kind: ChunkType::from(kind),
                header_size,
                size,
            })
            .parse_next(input)
    }

    /// Check `header_size <= size <= remaining`
    pub fn validate(&self, remaining: usize) -> Result<(), BufferError> {
        if (self.header_size as usize) < Self::SIZE || self.header_size as u32 > self.size {
            return Err(BufferError::Malformed(format!(
                "chunk {:?} has header size {} for chunk size {}",
                self.kind, self.header_size, self.size
            )));
        }

        if self.size as usize > remaining {
            return Err(BufferError::Malformed(format!(
                "chunk {:?} size {} exceeds the {} remaining bytes",
                self.kind, self.size, remaining
            )));
        }

        Ok(())
    }
}

/// One chunk cut out of its container
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub header: ChunkHeader,

    /// Offset of the chunk inside the walked container
    pub offset: usize,

    /// The whole chunk, header included
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Bytes that follow the chunk header
    #[inline]
    pub fn body(&self) -> &'a [u8] {
        &self.data[self.header.header_size as usize..]
    }

    /// Bytes of the extended header, after the common 8 bytes
    #[inline]
    pub fn header_fields(&self) -> &'a [u8] {
        &self.data[ChunkHeader::SIZE..self.header.header_size as usize]
    }
}

/// Walks sibling chunks using their `size` field
///
/// Stops after a `NULL` chunk or at the end of the input. Yields an error once
/// when a header is malformed or does not fit, then stops.
pub struct Chunks<'a> {
    input: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(input: &'a [u8], offset: usize) -> Chunks<'a> {
        Chunks {
            input,
            offset,
            done: false,
        }
    }

    /// Offset of the next chunk relative to the walked container
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>, BufferError> {
        let mut peek = self.input;
        let header = ChunkHeader::parse(&mut peek)?;

        if header.kind == ChunkType::Null {
            return Ok(None);
        }

        header.validate(self.input.len())?;

        let chunk = Chunk {
            header,
            offset: self.offset,
            data: slice(&mut self.input, header.size as usize)?,
        };
        self.offset += header.size as usize;

        Ok(Some(chunk))
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, (usize, BufferError)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.input.is_empty() {
            return None;
        }

        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err((self.offset, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_chunk;

    #[test]
    fn walks_siblings() {
        let mut data = write_chunk(0x0001, &[0; 4], &[1, 2, 3, 4]);
        data.extend(write_chunk(0x0202, &[], &[]));

        let chunks: Vec<_> = Chunks::new(&data, 0).collect::<Result<_, _>>().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].header.kind, ChunkType::StringPool);
        assert_eq!(chunks[0].body(), &[1, 2, 3, 4]);
        assert_eq!(chunks[0].header_fields(), &[0; 4]);
        assert_eq!(chunks[1].offset, 16);
        assert_eq!(chunks[1].header.kind, ChunkType::TableTypeSpec);
    }

    #[test]
    fn type_code_matches_wire_value() {
        for code in [0x0000, 0x0001, 0x0003, 0x0102, 0x017f, 0x0180, 0x0201, 0x0206, 0x0207, 0xbeef] {
            assert_eq!(ChunkType::from(code).code(), code);
        }
        assert_eq!(ChunkType::StringPool.code(), 0x0001);
    }

    #[test]
    fn null_chunk_ends_walk() {
        let mut data = write_chunk(0x0001, &[], &[]);
        data.extend([0u8; 8]);
        data.extend(write_chunk(0x0001, &[], &[]));

        assert_eq!(Chunks::new(&data, 0).count(), 1);
    }

    #[test]
    fn oversized_chunk_is_malformed() {
        let mut data = write_chunk(0x0001, &[], &[0; 4]);
        data[4] = 0xff;

        let err = Chunks::new(&data, 0).next().unwrap().unwrap_err();
        assert!(matches!(err, (0, BufferError::Malformed(_))));
    }

    #[test]
    fn header_larger_than_chunk_is_malformed() {
        let mut data = write_chunk(0x0001, &[], &[0; 4]);
        data[2] = 0x20;

        assert!(Chunks::new(&data, 0).next().unwrap().is_err());
    }

    #[test]
    fn short_trailer_is_truncation() {
        let data = [0x01, 0x00, 0x08];

        let (_, err) = Chunks::new(&data, 0).next().unwrap().unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn xml_node_range() {
        assert!(ChunkType::XmlStartElement.is_xml_node());
        assert!(ChunkType::XmlCdata.is_xml_node());
        assert!(!ChunkType::XmlResourceMap.is_xml_node());
        assert!(!ChunkType::StringPool.is_xml_node());
    }
}
