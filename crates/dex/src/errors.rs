//! Errors returned by this crate.

use apkparse_buffer::BufferError;
use thiserror::Error;

/// Errors that may occur while scanning a dex file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DexError {
    /// Magic is not `dex\n` or the version field is not three digits
    #[error("invalid header")]
    InvalidHeader,

    #[error("got unknown dex version: {0:03}")]
    UnknownVersion(u16),

    /// The endian tag says the file is big-endian
    #[error("big-endian dex files are not supported")]
    BigEndian,

    /// A section of the file can't be read
    #[error("can't read {section}: {source}")]
    Section {
        section: &'static str,
        source: BufferError,
    },

    #[error("checksum mismatch: header has 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("class enumeration was interrupted")]
    Interrupted,
}

impl DexError {
    /// Returns `true` if the file ended before a section was complete
    pub fn is_truncated(&self) -> bool {
        matches!(self, DexError::Section { source, .. } if source.is_truncated())
    }
}
