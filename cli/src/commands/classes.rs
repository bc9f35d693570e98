use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::commands::path_helpers::open_apk;

pub(crate) fn command_classes(path: &Path, json: bool) -> Result<()> {
    let apk = open_apk(path, None)?;
    let classes = apk.get_dex_classes()?;

    if json {
        println!("{}", serde_json::to_string(classes)?);
        return Ok(());
    }

    for class in classes {
        match &class.super_class {
            Some(super_class) => println!(
                "{:#06x} {} extends {}",
                class.access_flags,
                class.class_type.green(),
                super_class
            ),
            None => println!("{:#06x} {}", class.access_flags, class.class_type.green()),
        }
    }

    Ok(())
}
