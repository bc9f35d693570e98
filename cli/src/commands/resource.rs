use std::path::Path;

use anyhow::Result;
use apkparse::Locale;
use colored::Colorize;

use crate::commands::path_helpers::open_apk;

/// Accepts `0x7f010000` as well as plain decimal ids
pub(crate) fn parse_resource_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|err| format!("invalid resource id {:?}: {}", value, err))
}

pub(crate) fn command_resource(path: &Path, id: u32, locale: Option<Locale>) -> Result<()> {
    let apk = open_apk(path, locale.clone())?;
    let table = apk.resource_table()?;
    let resources = apk.get_resources_by_id(id)?;

    if resources.is_empty() {
        println!("resource 0x{:08x} not found", id);
        return Ok(());
    }

    for resource in resources {
        let qualifiers = resource.config().qualifiers();
        println!(
            "@{}/{} [{}]: {}",
            resource.type_name(),
            resource.key(),
            if qualifiers.is_empty() { "default" } else { &qualifiers },
            resource.to_string_value(table, locale.as_ref()).green()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_formats() {
        assert_eq!(parse_resource_id("0x7f010000"), Ok(0x7f010000));
        assert_eq!(parse_resource_id("0X7F010000"), Ok(0x7f010000));
        assert_eq!(parse_resource_id("2130771968"), Ok(0x7f010000));
        assert!(parse_resource_id("0xzz").is_err());
        assert!(parse_resource_id("").is_err());
    }
}
