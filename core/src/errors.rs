use std::io;

use apkparse_axml::{ArscError, AxmlError};
use apkparse_dex::DexError;
use apkparse_zip::{CertificateError, ZipError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApkError {
    /// The archive has no `AndroidManifest.xml`
    #[error("AndroidManifest.xml not found, not a valid apk")]
    ManifestNotFound,

    /// The archive has no `classes.dex`
    #[error("classes.dex not found")]
    DexNotFound,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid zip: {0}")]
    Zip(#[from] ZipError),

    #[error("invalid resources.arsc: {0}")]
    Resource(ArscError),

    #[error("invalid binary xml: {0}")]
    Manifest(AxmlError),

    #[error("invalid {file}: {source}")]
    Dex { file: String, source: DexError },

    #[error("can't read signers: {0}")]
    Certificate(#[from] CertificateError),

    /// The interrupt flag was raised while parsing
    #[error("parsing was interrupted")]
    Interrupted,
}

impl From<ArscError> for ApkError {
    fn from(err: ArscError) -> ApkError {
        match err {
            ArscError::Interrupted => ApkError::Interrupted,
            err => ApkError::Resource(err),
        }
    }
}

impl From<AxmlError> for ApkError {
    fn from(err: AxmlError) -> ApkError {
        match err {
            AxmlError::Interrupted => ApkError::Interrupted,
            err => ApkError::Manifest(err),
        }
    }
}

impl ApkError {
    pub(crate) fn dex(file: &str, err: DexError) -> ApkError {
        match err {
            DexError::Interrupted => ApkError::Interrupted,
            source => ApkError::Dex {
                file: file.to_owned(),
                source,
            },
        }
    }
}
