//! Android package parser.
//!
//! [`Apk`] opens the archive and lazily decodes the manifest, the resource
//! table, dex files and signatures on demand.

pub mod apk;
pub mod errors;
pub mod models;

pub use apk::Apk;
pub use apkparse_axml::{ApkMeta, GlEsVersion, IconPath, Locale, Permission, Resource, UseFeature};
pub use apkparse_buffer::Interrupt;
pub use apkparse_dex::DexClass;
pub use apkparse_zip::{ApkSigner, ApkV2Signer, CertificateMeta, FileCompressionType, SigningScheme};
pub use errors::ApkError;
pub use models::{AdaptiveIcon, Icon, IconFace};
