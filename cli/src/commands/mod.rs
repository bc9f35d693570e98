pub(crate) mod classes;
pub(crate) mod gzip;
pub(crate) mod icons;
pub(crate) mod manifest;
pub(crate) mod meta;
pub(crate) mod path_helpers;
pub(crate) mod resource;
pub(crate) mod signers;

pub(crate) use classes::command_classes;
pub(crate) use gzip::command_gzip;
pub(crate) use icons::command_icons;
pub(crate) use manifest::command_manifest;
pub(crate) use meta::command_meta;
pub(crate) use resource::{command_resource, parse_resource_id};
pub(crate) use signers::command_signers;
