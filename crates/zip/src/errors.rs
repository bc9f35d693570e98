use apkparse_buffer::BufferError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZipError {
    /// File doesn't start with a local file header
    #[error("not a zip archive")]
    InvalidHeader,

    /// Can't operate without EOCD
    #[error("can't find EOCD in zip")]
    NotFoundEOCD,

    /// Central directory can't be read at the offset given by EOCD
    #[error("can't read central directory: {0}")]
    CentralDirectory(BufferError),

    /// Provided file not found in zip
    #[error("file not exist in zip: {0}")]
    FileNotFound(String),

    /// Entry data goes past the end of the archive
    #[error("got EOF while reading {0}")]
    EOF(String),

    /// Got error while decompressing object
    #[error("got error while decompressing {0}")]
    DecompressionError(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// DER structure of a certificate or PKCS#7 blob is invalid
    #[error("invalid der encoding: {0}")]
    Der(String),

    /// PKCS#7 content is not `SignedData`
    #[error("unsupported pkcs#7 content type {0}")]
    UnsupportedContent(String),

    #[error("can't read signer block: {0}")]
    SignerBlock(BufferError),

    #[error(transparent)]
    Zip(#[from] ZipError),
}

/// Provide information about compression type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCompressionType {
    /// Used stored method for decompression
    Stored,

    /// Used deflated method for decompression
    Deflated,

    /// There was an attempt to break the parser,
    /// but actually use the stored method for decompression
    StoredTampered,

    /// There was an attempt to break the parser,
    /// but actually use the deflated method for decompression
    DeflatedTampered,
}
