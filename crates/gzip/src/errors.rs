use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GzipError {
    /// First member doesn't start with `1f 8b`
    #[error("input is not in the .gz format")]
    NotGzip,

    #[error("unsupported compression method {0} in the .gz header")]
    UnsupportedMethod(u8),

    #[error("reserved flags are set in the .gz header")]
    ReservedFlags,

    #[error("invalid compression level {0}, expected 0..=9")]
    InvalidLevel(u32),

    /// Deflate stream itself is broken
    #[error("gzip-compressed data is corrupt")]
    Corrupt,

    #[error("gzip-compressed data is corrupt (crc32 error)")]
    CrcMismatch,

    #[error("gzip-compressed data is corrupt (uncompressed size mismatch)")]
    SizeMismatch,

    /// Bytes after a member that don't form another member
    #[error("garbage after a valid .gz stream")]
    Garbage,

    #[error("unexpected end of gzip stream")]
    Truncated,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<GzipError> for io::Error {
    fn from(err: GzipError) -> io::Error {
        match err {
            GzipError::Io(err) => err,
            GzipError::Truncated => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            GzipError::InvalidLevel(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

impl GzipError {
    /// Recover the codec error wrapped by [`std::io::Read`]/[`std::io::Write`]
    pub fn from_io(err: io::Error) -> GzipError {
        match err.downcast::<GzipError>() {
            Ok(err) => err,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => GzipError::Truncated,
            Err(err) => GzipError::Io(err),
        }
    }
}
