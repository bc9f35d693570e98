use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apkparse::{Apk, Locale};
use walkdir::WalkDir;

/// Expand directories into the files with one of `extensions`, hidden entries are skipped
pub(crate) fn get_all_files<'a>(
    paths: &'a [PathBuf],
    extensions: &'a [&str],
) -> impl Iterator<Item = PathBuf> + 'a {
    paths.iter().flat_map(move |path| {
        if path.is_dir() {
            WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0
                        || e.file_name()
                            .to_str()
                            .map(|s| !s.starts_with('.'))
                            .unwrap_or(false)
                })
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
                .map(|e| e.into_path())
                .collect::<Vec<_>>()
        } else {
            vec![path.clone()]
        }
    })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

pub(crate) fn is_archive(path: &Path) -> bool {
    has_extension(path, &["apk", "zip", "jar"])
}

pub(crate) fn open_apk(path: &Path, locale: Option<Locale>) -> Result<Apk> {
    let mut apk = Apk::new(path).with_context(|| format!("got error while parsing apk: {:?}", path))?;
    apk.set_preferred_locale(locale);

    Ok(apk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter() {
        assert!(is_archive(Path::new("app.apk")));
        assert!(is_archive(Path::new("dir/APP.APK")));
        assert!(is_archive(Path::new("lib.jar")));
        assert!(!is_archive(Path::new("AndroidManifest.xml")));
        assert!(!is_archive(Path::new("apk")));
    }
}
