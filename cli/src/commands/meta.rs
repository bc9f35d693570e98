use std::path::{Path, PathBuf};

use anyhow::Result;
use apkparse::{ApkMeta, Locale};
use colored::Colorize;
use serde::Serialize;

use crate::commands::path_helpers::{get_all_files, open_apk};

#[derive(Serialize)]
struct MetaReport<'a> {
    path: &'a Path,
    meta: &'a ApkMeta,
}

pub(crate) fn command_meta(paths: &[PathBuf], locale: Option<Locale>, json: bool) -> Result<()> {
    let files: Vec<PathBuf> = get_all_files(paths, &["apk", "zip", "jar"]).collect();

    for (i, path) in files.iter().enumerate() {
        let apk = open_apk(path, locale.clone())?;
        let meta = apk.get_meta()?;

        if json {
            println!("{}", serde_json::to_string(&MetaReport { path, meta })?);
            continue;
        }

        println!("{}", path.display().to_string().blue().bold());
        show(meta);

        // Add a newline between APKs except after the last one
        if i != files.len() - 1 {
            println!();
        }
    }

    Ok(())
}

fn field(name: &str, value: Option<&str>) {
    println!("{}: {}", name, value.unwrap_or("-").green());
}

fn show(meta: &ApkMeta) {
    field("Package Name", meta.package_name());
    field("Application Label", meta.label());
    field("Icon", meta.icon());
    field("Version Name", meta.version_name());
    field(
        "Version Code",
        meta.version_code().map(|v| v.to_string()).as_deref(),
    );
    field("Min SDK Version", meta.min_sdk_version());
    field("Target SDK Version", meta.target_sdk_version());
    field("Max SDK Version", meta.max_sdk_version());
    field("Install Location", meta.install_location());
    field("Split", meta.split());

    if let Some(gl) = meta.gl_es_version() {
        println!("{}: {}", "OpenGL ES", format!("{}.{}", gl.major, gl.minor).green());
    }
    if meta.debuggable() {
        println!("{}", "Debuggable".red());
    }

    if !meta.uses_permissions().is_empty() {
        println!("Uses Permissions:");
        for permission in meta.uses_permissions() {
            println!("  {}", permission.green());
        }
    }

    if !meta.uses_features().is_empty() {
        println!("Uses Features:");
        for feature in meta.uses_features() {
            let required = if feature.required { "" } else { " (optional)" };
            println!("  {}{}", feature.name.green(), required);
        }
    }

    if !meta.permissions().is_empty() {
        println!("Declared Permissions:");
        for permission in meta.permissions() {
            println!(
                "  {} [{}]",
                permission.name.as_deref().unwrap_or("-").green(),
                permission.protection_level.as_deref().unwrap_or("normal")
            );
        }
    }
}
