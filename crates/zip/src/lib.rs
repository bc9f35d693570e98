//! ZIP reader tuned for APK files.
//!
//! Besides plain entry access it tolerates the tricks used to break other
//! parsers (fake EOCD records, bogus compression methods) and extracts signer
//! certificates from both v1 (JAR) signature files and the APK signing block.

pub mod archive;
pub mod certificate;
pub mod errors;
pub mod signing_block;
pub mod structs;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use archive::ZipArchive;
pub use certificate::{ApkSigner, ApkV2Signer, CertificateMeta};
pub use errors::*;
pub use signing_block::{BlockKind, SigningBlock, SigningPair, SigningScheme};
