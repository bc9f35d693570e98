use apkparse_buffer::BufferError;
use thiserror::Error;

/// Errors raised while decoding `resources.arsc`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArscError {
    /// The root chunk of the table could not be read
    #[error("invalid resource table header: {0}")]
    Header(BufferError),

    /// A chunk header or chunk body is out of bounds or malformed
    #[error("corrupt resource table chunk at offset 0x{offset:x}: {source}")]
    Chunk { offset: usize, source: BufferError },

    /// Global, type or key string pool could not be decoded
    #[error("corrupt string pool at offset 0x{offset:x}: {source}")]
    StringPool { offset: usize, source: BufferError },

    /// String does not fit the length encoding of the pool
    #[error("string of {0} units is too long for the pool encoding")]
    StringTooLong(usize),

    /// The caller asked to stop the decode
    #[error("resource table decoding was interrupted")]
    Interrupted,
}

impl ArscError {
    /// Returns `true` if the table ended in the middle of a structure
    pub fn is_truncated(&self) -> bool {
        match self {
            ArscError::Header(e)
            | ArscError::Chunk { source: e, .. }
            | ArscError::StringPool { source: e, .. } => e.is_truncated(),
            _ => false,
        }
    }
}

/// Errors raised while decoding a binary XML document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AxmlError {
    /// Provided file too small to be a binary xml document
    #[error("file size too small for binary xml")]
    TooSmall,

    /// Header of the document has an unexpected size, must be 8
    #[error("got invalid header size {0}, expected 8")]
    HeaderSize(u16),

    /// The document has no string pool before its first node
    #[error("binary xml has no string pool")]
    MissingStringPool,

    #[error("corrupt string pool at offset 0x{offset:x}: {source}")]
    StringPool { offset: usize, source: BufferError },

    /// A chunk inside the document is out of bounds or malformed
    #[error("corrupt xml chunk at offset 0x{offset:x}: {source}")]
    Chunk { offset: usize, source: BufferError },

    /// The caller asked to stop the decode
    #[error("binary xml decoding was interrupted")]
    Interrupted,
}

impl AxmlError {
    /// Returns `true` if the document ended in the middle of a structure
    pub fn is_truncated(&self) -> bool {
        match self {
            AxmlError::TooSmall => true,
            AxmlError::StringPool { source, .. } | AxmlError::Chunk { source, .. } => {
                source.is_truncated()
            }
            _ => false,
        }
    }
}
