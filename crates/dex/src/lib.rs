//! Scanner of Dalvik executables that names classes, their superclasses and
//! access flags without decoding code.

pub mod class;
pub mod dex;
pub mod errors;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use class::DexClass;
pub use dex::{AccessFlags, ClassItem, Dex, DexHeader, DexVersion};
pub use errors::DexError;
