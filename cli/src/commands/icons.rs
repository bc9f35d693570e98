use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use apkparse::{Icon, IconFace, Locale};
use colored::Colorize;

use crate::commands::path_helpers::open_apk;

pub(crate) fn command_icons(path: &Path, output: Option<&Path>, locale: Option<Locale>) -> Result<()> {
    let apk = open_apk(path, locale)?;
    let icons = apk.get_all_icons()?;

    if let Some(output) = output {
        fs::create_dir_all(output).with_context(|| format!("can't create folder: {:?}", output))?;
    }

    for face in &icons {
        match face {
            IconFace::File(icon) => show(icon, "icon", output)?,
            IconFace::Adaptive(adaptive) => {
                for (kind, layer) in [("foreground", &adaptive.foreground), ("background", &adaptive.background)] {
                    if let Some(icon) = layer {
                        show(icon, kind, output)?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn show(icon: &Icon, kind: &str, output: Option<&Path>) -> Result<()> {
    let size = icon.data.as_ref().map_or(0, Vec::len);
    println!("{:>10} {:>5} {} ({} bytes)", kind, icon.density, icon.path.green(), size);

    let (Some(output), Some(data)) = (output, &icon.data) else {
        return Ok(());
    };

    // flatten `res/mipmap-hdpi/icon.png` into `mipmap-hdpi_icon.png`
    let name = icon
        .path
        .trim_start_matches("res/")
        .replace(['/', '\\'], "_");
    let target = output.join(name);
    fs::write(&target, data).with_context(|| format!("can't write icon: {:?}", target))?;

    Ok(())
}
