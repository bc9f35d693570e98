//! Decoders for the Android binary resource formats: the compiled resource
//! table (`resources.arsc`) and binary XML documents such as
//! `AndroidManifest.xml`.

pub mod arsc;
pub mod attrs;
pub mod axml;
pub mod errors;
pub mod icon;
pub mod locale;
pub mod meta;
pub mod printer;
pub mod sink;
pub mod structs;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use arsc::{Resource, ResourcePackage, ResourceTable};
pub use axml::{ANDROID_NAMESPACE, AxmlDecoder};
pub use errors::{ArscError, AxmlError};
pub use icon::{AdaptiveIconLayers, AdaptiveIconSink};
pub use locale::Locale;
pub use meta::{ApkMeta, ApkMetaTranslator, GlEsVersion, IconPath, Permission, UseFeature};
pub use printer::XmlPrinter;
pub use sink::{CompositeSink, XmlSink};
