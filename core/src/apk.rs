use std::fs;
use std::iter;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use apkparse_axml::structs::Density;
use apkparse_axml::{
    AdaptiveIconSink, ApkMeta, ApkMetaTranslator, AxmlDecoder, CompositeSink, IconPath, Locale,
    Resource, ResourceTable, XmlPrinter,
};
use apkparse_buffer::Interrupt;
use apkparse_dex::{Dex, DexClass};
use apkparse_zip::{ApkSigner, ApkV2Signer, FileCompressionType, ZipArchive, ZipError};
use log::{debug, info, warn};
use once_cell::unsync::OnceCell;

use crate::errors::ApkError;
use crate::models::{AdaptiveIcon, Icon, IconFace};

const ANDROID_MANIFEST_PATH: &str = "AndroidManifest.xml";
const RESOURCE_TABLE_PATH: &str = "resources.arsc";

/// Upper bound for `classesN.dex` probing
const MAX_DEX_FILES: usize = 999;

/// Results of the single pass over `AndroidManifest.xml`
struct Manifest {
    xml: String,
    meta: ApkMeta,
    icon_paths: Vec<IconPath>,
}

/// Main structure that represents APK file
///
/// Everything is parsed lazily on first access and cached. The caches use
/// single-threaded cells, so an `Apk` can move between threads but can't be
/// shared.
pub struct Apk {
    zip: ZipArchive,
    locale: Option<Locale>,
    interrupt: Interrupt,

    table: OnceCell<ResourceTable>,
    manifest: OnceCell<Manifest>,
    dex_classes: OnceCell<Vec<DexClass>>,
    signers_v1: OnceCell<Vec<ApkSigner>>,
    signers_v2: OnceCell<Vec<ApkV2Signer>>,
}

impl Apk {
    pub fn new(path: impl AsRef<Path>) -> Result<Apk, ApkError> {
        let input = fs::read(path.as_ref())?;
        info!("loaded {} ({} bytes)", path.as_ref().display(), input.len());

        Self::from_bytes(input)
    }

    pub fn from_bytes(input: Vec<u8>) -> Result<Apk, ApkError> {
        let zip = ZipArchive::new(input)?;

        Ok(Apk {
            zip,
            locale: Some(Locale::en_us()),
            interrupt: Interrupt::none(),
            table: OnceCell::new(),
            manifest: OnceCell::new(),
            dex_classes: OnceCell::new(),
            signers_v1: OnceCell::new(),
            signers_v2: OnceCell::new(),
        })
    }

    #[inline]
    pub fn preferred_locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Locale used to resolve references, `None` renders them as `@type/key`
    ///
    /// Drops the cached manifest xml and meta when the locale changes.
    pub fn set_preferred_locale(&mut self, locale: Option<Locale>) {
        if self.locale != locale {
            self.locale = locale;
            self.manifest.take();
        }
    }

    /// Flag polled between chunks, classes and dex files
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Interrupt::new(flag);
    }

    /// List of the filenames included in the central directory
    #[inline]
    pub fn namelist(&self) -> impl Iterator<Item = &str> + '_ {
        self.zip.namelist()
    }

    /// Read data from zip by filename
    #[inline]
    pub fn read(&self, path: &str) -> Result<(Vec<u8>, FileCompressionType), ZipError> {
        self.zip.read(path)
    }

    /// Content of `path`, `None` if the archive has no such entry
    pub fn get_file_data(&self, path: &str) -> Result<Option<Vec<u8>>, ApkError> {
        match self.zip.read(path) {
            Ok((data, _)) => Ok(Some(data)),
            Err(ZipError::FileNotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Decoded `resources.arsc`, empty if the archive has none
    pub fn resource_table(&self) -> Result<&ResourceTable, ApkError> {
        self.table.get_or_try_init(|| match self.get_file_data(RESOURCE_TABLE_PATH)? {
            Some(data) => Ok(ResourceTable::parse(&data, &self.interrupt)?),
            None => {
                debug!("no {}, using an empty resource table", RESOURCE_TABLE_PATH);
                Ok(ResourceTable::empty())
            }
        })
    }

    fn decoder(&self) -> Result<AxmlDecoder<'_>, ApkError> {
        Ok(AxmlDecoder::new()
            .with_resources(self.resource_table()?, self.locale.as_ref())
            .with_interrupt(self.interrupt.clone()))
    }

    fn manifest(&self) -> Result<&Manifest, ApkError> {
        self.manifest.get_or_try_init(|| {
            let data = self
                .get_file_data(ANDROID_MANIFEST_PATH)?
                .ok_or(ApkError::ManifestNotFound)?;

            let table = self.resource_table()?;
            let mut printer = XmlPrinter::new();
            let mut translator = ApkMetaTranslator::new(table, self.locale.as_ref());

            {
                let mut sink = CompositeSink::new()
                    .with(&mut printer)
                    .with(&mut translator);
                self.decoder()?.decode(&data, &mut sink)?;
            }

            let (meta, icon_paths) = translator.into_parts();
            Ok(Manifest {
                xml: printer.into_string(),
                meta,
                icon_paths,
            })
        })
    }

    /// Text form of `AndroidManifest.xml`
    pub fn get_manifest_xml(&self) -> Result<&str, ApkError> {
        Ok(&self.manifest()?.xml)
    }

    pub fn get_meta(&self) -> Result<&ApkMeta, ApkError> {
        Ok(&self.manifest()?.meta)
    }

    /// Every density variant of the application icon
    pub fn get_icon_paths(&self) -> Result<&[IconPath], ApkError> {
        Ok(&self.manifest()?.icon_paths)
    }

    /// Text form of any binary xml in the archive, `None` if it's missing
    pub fn trans_binary_xml(&self, path: &str) -> Result<Option<String>, ApkError> {
        let Some(data) = self.get_file_data(path)? else {
            return Ok(None);
        };

        Ok(Some(self.decoder()?.to_xml(&data)?))
    }

    /// All configuration variants of resource `id`
    pub fn get_resources_by_id(&self, id: u32) -> Result<Vec<Resource<'_>>, ApkError> {
        Ok(self.resource_table()?.get_resources_by_id(id))
    }

    /// Locales the resource table has configurations for
    pub fn get_locales(&self) -> Result<Vec<Locale>, ApkError> {
        Ok(self.resource_table()?.locales())
    }

    /// Classes of `classes.dex`, `classes2.dex`, ... in archive order
    pub fn get_dex_classes(&self) -> Result<&[DexClass], ApkError> {
        let classes = self.dex_classes.get_or_try_init(|| {
            let names = iter::once("classes.dex".to_owned())
                .chain((2..=MAX_DEX_FILES).map(|i| format!("classes{i}.dex")));

            let mut classes = Vec::new();
            for (i, name) in names.enumerate() {
                self.interrupt.check().map_err(|_| ApkError::Interrupted)?;

                let data = match self.get_file_data(&name)? {
                    Some(data) => data,
                    None if i == 0 => return Err(ApkError::DexNotFound),
                    None => break,
                };

                let found = Dex::new(data)
                    .and_then(|dex| dex.classes(&self.interrupt))
                    .map_err(|err| ApkError::dex(&name, err));

                match found {
                    Ok(found) => {
                        debug!("{} has {} classes", name, found.len());
                        classes.extend(found);
                    }
                    Err(ApkError::Dex { source, .. }) if i > 0 => {
                        warn!("skipping {}: {}", name, source);
                    }
                    Err(err) => return Err(err),
                }
            }

            Ok(classes)
        })?;

        Ok(classes.as_slice())
    }

    fn file_icon(&self, path: &str, density: u16) -> Result<Icon, ApkError> {
        Ok(Icon {
            path: path.to_owned(),
            density,
            data: self.get_file_data(path)?,
        })
    }

    /// Icons of every density, xml variants are read as adaptive icons
    pub fn get_all_icons(&self) -> Result<Vec<IconFace>, ApkError> {
        let icon_paths = self.get_icon_paths()?;
        let mut faces = Vec::with_capacity(icon_paths.len());

        for icon_path in icon_paths {
            if !icon_path.path.ends_with(".xml") {
                faces.push(IconFace::File(
                    self.file_icon(&icon_path.path, icon_path.density)?,
                ));
                continue;
            }

            let Some(data) = self.get_file_data(&icon_path.path)? else {
                debug!("icon {} is missing from the archive", icon_path.path);
                continue;
            };

            let mut sink = AdaptiveIconSink::new();
            self.decoder()?.decode(&data, &mut sink)?;
            let layers = sink.into_layers();

            let layer = |path: Option<String>| {
                path.map(|path| self.file_icon(&path, icon_path.density))
                    .transpose()
            };

            faces.push(IconFace::Adaptive(AdaptiveIcon {
                foreground: layer(layers.foreground)?,
                background: layer(layers.background)?,
            }));
        }

        Ok(faces)
    }

    /// Default application icon
    pub fn get_icon_file(&self) -> Result<Option<Icon>, ApkError> {
        match self.get_meta()?.icon() {
            Some(path) => Ok(Some(self.file_icon(path, Density::DEFAULT)?)),
            None => Ok(None),
        }
    }

    /// v1 signers, one per `META-INF` signature file
    pub fn get_signers_v1(&self) -> Result<&[ApkSigner], ApkError> {
        let signers = self.signers_v1.get_or_try_init(|| self.zip.signers_v1())?;
        Ok(signers.as_slice())
    }

    /// v2 and newer signers from the signing block
    pub fn get_signers_v2(&self) -> Result<&[ApkV2Signer], ApkError> {
        let signers = self.signers_v2.get_or_try_init(|| self.zip.signers_v2())?;
        Ok(signers.as_slice())
    }
}
