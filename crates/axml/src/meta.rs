use log::debug;
use serde::Serialize;

use crate::arsc::ResourceTable;
use crate::locale::Locale;
use crate::sink::XmlSink;
use crate::structs::{Density, EndTag, StartTag};

/// `<uses-feature>` with a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseFeature {
    pub name: String,
    pub required: bool,
}

/// `<uses-feature android:glEsVersion>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlEsVersion {
    pub major: u32,
    pub minor: u32,
    pub required: bool,
}

impl GlEsVersion {
    pub fn from_raw(value: u32, required: bool) -> GlEsVersion {
        GlEsVersion {
            major: value >> 16,
            minor: value & 0xffff,
            required,
        }
    }
}

/// Permission declared by the application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub name: Option<String>,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
    pub protection_level: Option<String>,
}

/// One density variant of the application icon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconPath {
    pub path: String,
    pub density: u16,
}

/// Facts collected from `AndroidManifest.xml`
///
/// Built once by [`ApkMetaTranslator`] through [`ApkMetaBuilder`] and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkMeta {
    package_name: Option<String>,
    label: Option<String>,
    icon: Option<String>,
    version_name: Option<String>,
    version_code: Option<i64>,
    revision_code: Option<i64>,
    shared_user_id: Option<String>,
    shared_user_label: Option<String>,
    split: Option<String>,
    config_for_split: Option<String>,
    is_feature_split: bool,
    is_split_required: bool,
    isolated_splits: bool,
    install_location: Option<String>,
    min_sdk_version: Option<String>,
    target_sdk_version: Option<String>,
    max_sdk_version: Option<String>,
    compile_sdk_version: Option<String>,
    compile_sdk_version_codename: Option<String>,
    platform_build_version_code: Option<String>,
    platform_build_version_name: Option<String>,
    gl_es_version: Option<GlEsVersion>,
    any_density: bool,
    small_screens: bool,
    normal_screens: bool,
    large_screens: bool,
    debuggable: bool,
    uses_permissions: Vec<String>,
    uses_features: Vec<UseFeature>,
    permissions: Vec<Permission>,
}

impl ApkMeta {
    pub fn builder() -> ApkMetaBuilder {
        ApkMetaBuilder::default()
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn version_name(&self) -> Option<&str> {
        self.version_name.as_deref()
    }

    /// `versionCodeMajor << 32 | versionCode`
    pub fn version_code(&self) -> Option<i64> {
        self.version_code
    }

    pub fn revision_code(&self) -> Option<i64> {
        self.revision_code
    }

    pub fn shared_user_id(&self) -> Option<&str> {
        self.shared_user_id.as_deref()
    }

    pub fn shared_user_label(&self) -> Option<&str> {
        self.shared_user_label.as_deref()
    }

    pub fn split(&self) -> Option<&str> {
        self.split.as_deref()
    }

    pub fn config_for_split(&self) -> Option<&str> {
        self.config_for_split.as_deref()
    }

    pub fn is_feature_split(&self) -> bool {
        self.is_feature_split
    }

    pub fn is_split_required(&self) -> bool {
        self.is_split_required
    }

    pub fn isolated_splits(&self) -> bool {
        self.isolated_splits
    }

    pub fn install_location(&self) -> Option<&str> {
        self.install_location.as_deref()
    }

    pub fn min_sdk_version(&self) -> Option<&str> {
        self.min_sdk_version.as_deref()
    }

    pub fn target_sdk_version(&self) -> Option<&str> {
        self.target_sdk_version.as_deref()
    }

    pub fn max_sdk_version(&self) -> Option<&str> {
        self.max_sdk_version.as_deref()
    }

    pub fn compile_sdk_version(&self) -> Option<&str> {
        self.compile_sdk_version.as_deref()
    }

    pub fn compile_sdk_version_codename(&self) -> Option<&str> {
        self.compile_sdk_version_codename.as_deref()
    }

    pub fn platform_build_version_code(&self) -> Option<&str> {
        self.platform_build_version_code.as_deref()
    }

    pub fn platform_build_version_name(&self) -> Option<&str> {
        self.platform_build_version_name.as_deref()
    }

    pub fn gl_es_version(&self) -> Option<GlEsVersion> {
        self.gl_es_version
    }

    pub fn any_density(&self) -> bool {
        self.any_density
    }

    pub fn small_screens(&self) -> bool {
        self.small_screens
    }

    pub fn normal_screens(&self) -> bool {
        self.normal_screens
    }

    pub fn large_screens(&self) -> bool {
        self.large_screens
    }

    pub fn debuggable(&self) -> bool {
        self.debuggable
    }

    pub fn uses_permissions(&self) -> &[String] {
        &self.uses_permissions
    }

    pub fn uses_features(&self) -> &[UseFeature] {
        &self.uses_features
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

/// Mutable accumulator of [`ApkMeta`] fields
#[derive(Debug, Clone, Default)]
pub struct ApkMetaBuilder {
    meta: ApkMeta,
}

macro_rules! setters {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, value: $ty) -> &mut Self {
                self.meta.$name = value;
                self
            }
        )*
    };
}

impl ApkMetaBuilder {
    setters! {
        package_name: Option<String>,
        label: Option<String>,
        icon: Option<String>,
        version_name: Option<String>,
        version_code: Option<i64>,
        revision_code: Option<i64>,
        shared_user_id: Option<String>,
        shared_user_label: Option<String>,
        split: Option<String>,
        config_for_split: Option<String>,
        is_feature_split: bool,
        is_split_required: bool,
        isolated_splits: bool,
        install_location: Option<String>,
        min_sdk_version: Option<String>,
        target_sdk_version: Option<String>,
        max_sdk_version: Option<String>,
        compile_sdk_version: Option<String>,
        compile_sdk_version_codename: Option<String>,
        platform_build_version_code: Option<String>,
        platform_build_version_name: Option<String>,
        gl_es_version: Option<GlEsVersion>,
        any_density: bool,
        small_screens: bool,
        normal_screens: bool,
        large_screens: bool,
        debuggable: bool,
    }

    pub fn add_uses_permission(&mut self, permission: String) -> &mut Self {
        self.meta.uses_permissions.push(permission);
        self
    }

    pub fn add_uses_feature(&mut self, feature: UseFeature) -> &mut Self {
        self.meta.uses_features.push(feature);
        self
    }

    pub fn add_permission(&mut self, permission: Permission) -> &mut Self {
        self.meta.permissions.push(permission);
        self
    }

    pub fn build(&self) -> ApkMeta {
        self.meta.clone()
    }
}

/// Sink extracting [`ApkMeta`] from manifest events
pub struct ApkMetaTranslator<'a> {
    table: &'a ResourceTable,
    locale: Option<&'a Locale>,
    builder: ApkMetaBuilder,
    icon_paths: Vec<IconPath>,
}

impl<'a> ApkMetaTranslator<'a> {
    pub fn new(table: &'a ResourceTable, locale: Option<&'a Locale>) -> ApkMetaTranslator<'a> {
        ApkMetaTranslator {
            table,
            locale,
            builder: ApkMetaBuilder::default(),
            icon_paths: Vec::new(),
        }
    }

    pub fn apk_meta(&self) -> ApkMeta {
        self.builder.build()
    }

    /// Every density variant of the application icon
    pub fn icon_paths(&self) -> &[IconPath] {
        &self.icon_paths
    }

    pub fn into_parts(self) -> (ApkMeta, Vec<IconPath>) {
        (self.builder.build(), self.icon_paths)
    }

    fn on_application(&mut self, tag: &StartTag) {
        self.builder.debuggable(tag.get_bool("debuggable", false));
        if let Some(label) = tag.get("label") {
            self.builder.label(Some(label.to_owned()));
        }

        if let Some(id) = tag.get_reference("icon") {
            let icons: Vec<IconPath> = self
                .table
                .get_resources_by_id(id)
                .iter()
                .map(|resource| IconPath {
                    path: resource.to_string_value(self.table, self.locale),
                    density: resource.density(),
                })
                .collect();

            let icon = icons
                .iter()
                .find(|icon| icon.density == Density::DEFAULT)
                .or_else(|| icons.first())
                .map(|icon| icon.path.clone());

            debug!("application icon has {} variants", icons.len());

            if icon.is_some() {
                self.builder.icon(icon);
                self.icon_paths = icons;
            }
        } else if let Some(icon) = tag.get("icon") {
            self.builder.icon(Some(icon.to_owned()));
            self.icon_paths = vec![IconPath {
                path: icon.to_owned(),
                density: Density::DEFAULT,
            }];
        }
    }

    fn on_manifest(&mut self, tag: &StartTag) {
        let string = |name: &str| tag.get(name).map(str::to_owned);

        let version_code = match (tag.get_long("versionCodeMajor"), tag.get_long("versionCode")) {
            (Some(major), code) => Some((major << 32) | (code.unwrap_or(0) & 0xffff_ffff)),
            (None, code) => code,
        };

        self.builder
            .package_name(string("package"))
            .version_name(string("versionName"))
            .version_code(version_code)
            .revision_code(tag.get_long("revisionCode"))
            .shared_user_id(string("sharedUserId"))
            .shared_user_label(string("sharedUserLabel"))
            .split(string("split"))
            .config_for_split(string("configForSplit"))
            .is_feature_split(tag.get_bool("isFeatureSplit", false))
            .is_split_required(tag.get_bool("isSplitRequired", false))
            .isolated_splits(tag.get_bool("isolatedSplits", false))
            .compile_sdk_version(string("compileSdkVersion"))
            .compile_sdk_version_codename(string("compileSdkVersionCodename"))
            .platform_build_version_code(string("platformBuildVersionCode"))
            .platform_build_version_name(string("platformBuildVersionName"));

        if let Some(location) = string("installLocation") {
            self.builder.install_location(Some(location));
        }
    }
}

impl XmlSink for ApkMetaTranslator<'_> {
    fn on_start_tag(&mut self, tag: &StartTag) {
        let string = |name: &str| tag.get(name).map(str::to_owned);

        match tag.name.as_str() {
            "application" => self.on_application(tag),
            "manifest" => self.on_manifest(tag),
            "uses-sdk" => {
                if let Some(v) = string("minSdkVersion") {
                    self.builder.min_sdk_version(Some(v));
                }
                if let Some(v) = string("targetSdkVersion") {
                    self.builder.target_sdk_version(Some(v));
                }
                if let Some(v) = string("maxSdkVersion") {
                    self.builder.max_sdk_version(Some(v));
                }
            }
            "supports-screens" => {
                self.builder
                    .any_density(tag.get_bool("anyDensity", false))
                    .small_screens(tag.get_bool("smallScreens", false))
                    .normal_screens(tag.get_bool("normalScreens", false))
                    .large_screens(tag.get_bool("largeScreens", false));
            }
            "uses-feature" => {
                let required = tag.get_bool("required", false);

                if let Some(name) = string("name") {
                    self.builder.add_uses_feature(UseFeature { name, required });
                } else if let Some(gl) = tag.get_long("glEsVersion") {
                    self.builder
                        .gl_es_version(Some(GlEsVersion::from_raw(gl as u32, required)));
                }
            }
            "uses-permission" => {
                if let Some(name) = string("name") {
                    self.builder.add_uses_permission(name);
                }
            }
            "permission" => {
                self.builder.add_permission(Permission {
                    name: string("name"),
                    label: string("label"),
                    icon: string("icon"),
                    description: string("description"),
                    group: string("permissionGroup").or_else(|| string("group")),
                    protection_level: string("protectionLevel"),
                });
            }
            _ => {}
        }
    }

    fn on_end_tag(&mut self, _tag: &EndTag) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Attribute, ResourceValue, ValueType};

    fn tag(name: &str, attributes: &[(&str, &str, ValueType, u32)]) -> StartTag {
        StartTag {
            name: name.to_owned(),
            attributes: attributes
                .iter()
                .map(|(name, value, data_type, data)| Attribute {
                    namespace: None,
                    prefix: None,
                    name: name.to_string(),
                    value: value.to_string(),
                    typed_value: ResourceValue::new(*data_type, *data),
                })
                .collect(),
            ..StartTag::default()
        }
    }

    fn s(name: &'static str, value: &'static str) -> (&'static str, &'static str, ValueType, u32) {
        (name, value, ValueType::String, 0)
    }

    #[test]
    fn collects_manifest_facts() {
        let table = ResourceTable::empty();
        let mut translator = ApkMetaTranslator::new(&table, None);

        translator.on_start_tag(&tag(
            "manifest",
            &[
                s("package", "com.example"),
                s("versionName", "1.2"),
                ("versionCode", "7", ValueType::Dec, 7),
                ("versionCodeMajor", "1", ValueType::Dec, 1),
                ("installLocation", "preferExternal", ValueType::Dec, 2),
                s("isFeatureSplit", "true"),
            ],
        ));
        translator.on_start_tag(&tag(
            "uses-sdk",
            &[s("minSdkVersion", "21"), s("targetSdkVersion", "34")],
        ));
        translator.on_start_tag(&tag("uses-permission", &[s("name", "android.permission.INTERNET")]));
        translator.on_start_tag(&tag("uses-permission", &[]));
        translator.on_start_tag(&tag(
            "uses-feature",
            &[s("name", "android.hardware.camera"), s("required", "true")],
        ));
        translator.on_start_tag(&tag(
            "uses-feature",
            &[("glEsVersion", "0x20001", ValueType::Hex, 0x20001)],
        ));
        translator.on_start_tag(&tag(
            "permission",
            &[s("name", "com.example.READ"), s("protectionLevel", "signature")],
        ));
        translator.on_start_tag(&tag(
            "application",
            &[s("label", "Example"), s("debuggable", "true"), s("icon", "res/icon.png")],
        ));

        let (meta, icons) = translator.into_parts();
        assert_eq!(meta.package_name(), Some("com.example"));
        assert_eq!(meta.version_name(), Some("1.2"));
        assert_eq!(meta.version_code(), Some((1 << 32) | 7));
        assert_eq!(meta.install_location(), Some("preferExternal"));
        assert!(meta.is_feature_split());
        assert!(!meta.is_split_required());
        assert_eq!(meta.min_sdk_version(), Some("21"));
        assert_eq!(meta.target_sdk_version(), Some("34"));
        assert_eq!(meta.max_sdk_version(), None);
        assert_eq!(meta.uses_permissions(), ["android.permission.INTERNET"]);
        assert_eq!(
            meta.uses_features(),
            [UseFeature {
                name: "android.hardware.camera".to_owned(),
                required: true
            }]
        );
        assert_eq!(
            meta.gl_es_version(),
            Some(GlEsVersion {
                major: 2,
                minor: 1,
                required: false
            })
        );
        assert_eq!(meta.permissions()[0].protection_level.as_deref(), Some("signature"));
        assert_eq!(meta.label(), Some("Example"));
        assert!(meta.debuggable());
        assert_eq!(meta.icon(), Some("res/icon.png"));
        assert_eq!(icons.len(), 1);
    }

    #[test]
    fn version_code_without_major() {
        let table = ResourceTable::empty();
        let mut translator = ApkMetaTranslator::new(&table, None);
        translator.on_start_tag(&tag("manifest", &[("versionCode", "-1", ValueType::Dec, u32::MAX)]));

        assert_eq!(translator.apk_meta().version_code(), Some(-1));
    }

    #[test]
    fn unresolved_icon_reference_leaves_icon_empty() {
        let table = ResourceTable::empty();
        let mut translator = ApkMetaTranslator::new(&table, None);
        translator.on_start_tag(&tag(
            "application",
            &[("icon", "resourceId:0x7f020000", ValueType::Reference, 0x7f020000)],
        ));

        assert_eq!(translator.apk_meta().icon(), None);
        assert!(translator.icon_paths().is_empty());
    }

    #[test]
    fn builder_snapshots_are_equal() {
        let mut builder = ApkMeta::builder();
        builder.package_name(Some("a.b".to_owned())).min_sdk_version(Some("21".to_owned()));

        let meta = builder.build();
        assert_eq!(meta.package_name(), Some("a.b"));
        assert_eq!(meta, builder.build());
    }
}
