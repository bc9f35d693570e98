use std::collections::BTreeMap;

use apkparse_buffer::{BufferError, Interrupt, le_u32};
use log::{debug, info, warn};
use winnow::error::{ContextError, ErrMode};

use crate::errors::ArscError;
use crate::locale::{self, Locale};
use crate::structs::{
    Chunk, ChunkHeader, ChunkType, Chunks, Density, EntryValue, LibraryEntry, PackageHeader,
    ResTableConfig, ResourceEntry, StringPool, TableType, TypeSpec,
};

/// Maximum length of a reference chain before resolution gives up
const MAX_REFERENCE_DEPTH: usize = 16;

/// One package of a resource table with its own type and key pools
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePackage {
    pub id: u8,
    pub name: String,

    /// Names of the types, `string`, `drawable`, ...
    pub type_strings: StringPool,

    /// Names of the entries
    pub key_strings: StringPool,

    type_id_offset: u32,
    specs: BTreeMap<u8, TypeSpec>,
    types: BTreeMap<u8, Vec<TableType>>,
    libraries: Vec<LibraryEntry>,
}

impl ResourcePackage {
    /// Decode a package chunk, `None` if its id can't appear in a resource id
    fn parse(chunk: &Chunk<'_>, interrupt: &Interrupt) -> Result<Option<ResourcePackage>, ArscError> {
        let header = PackageHeader::parse(chunk).map_err(chunk_error(chunk))?;

        let Ok(id) = u8::try_from(header.id) else {
            warn!(
                "skipped package 0x{:x} at 0x{:x}, id does not fit a resource id",
                header.id, chunk.offset
            );
            return Ok(None);
        };

        let mut package = ResourcePackage {
            id,
            name: header.name,
            type_id_offset: header.type_id_offset,
            ..ResourcePackage::default()
        };

        let mut pools = 0;
        let body_offset = chunk.offset + chunk.header.header_size as usize;

        for child in Chunks::new(chunk.body(), body_offset) {
            interrupt.check().map_err(|_| ArscError::Interrupted)?;
            let child = child.map_err(|(offset, source)| ArscError::Chunk { offset, source })?;

            match child.header.kind {
                ChunkType::StringPool => {
                    let pool = StringPool::parse(child.data).map_err(|source| {
                        ArscError::StringPool {
                            offset: child.offset,
                            source,
                        }
                    })?;

                    match pools {
                        0 => package.type_strings = pool,
                        1 => package.key_strings = pool,
                        _ => warn!("extra string pool in package at 0x{:x}", child.offset),
                    }
                    pools += 1;
                }
                ChunkType::TableTypeSpec => {
                    let spec = TypeSpec::parse(&child).map_err(chunk_error(&child))?;
                    debug!(
                        "type spec {} with {} entries",
                        spec.id,
                        spec.entry_count()
                    );

                    package.specs.insert(spec.id, spec);
                }
                ChunkType::TableType => {
                    let table_type = TableType::parse(&child).map_err(chunk_error(&child))?;
                    debug!("type {} for {}", table_type.id, table_type.config);

                    package
                        .types
                        .entry(table_type.id)
                        .or_default()
                        .push(table_type);
                }
                ChunkType::TableLibrary => {
                    let entries = LibraryEntry::parse_all(&child).map_err(chunk_error(&child))?;
                    package.libraries.extend(entries);
                }
                other => warn!("skipped package chunk {:?} at 0x{:x}", other, child.offset),
            }
        }

        Ok(Some(package))
    }

    /// Add types of another chunk that declared the same package id
    fn merge(&mut self, other: ResourcePackage) {
        if self.type_strings.is_empty() {
            self.type_strings = other.type_strings;
        }
        if self.key_strings.is_empty() {
            self.key_strings = other.key_strings;
        }

        self.specs.extend(other.specs);
        for (id, types) in other.types {
            self.types.entry(id).or_default().extend(types);
        }
        self.libraries.extend(other.libraries);
    }

    /// Name of type `type_id` from the type pool
    pub fn type_name(&self, type_id: u8) -> Option<&str> {
        let idx = (type_id as u32)
            .checked_sub(1)?
            .checked_sub(self.type_id_offset)?;
        self.type_strings.get(idx)
    }

    #[inline]
    pub fn type_spec(&self, type_id: u8) -> Option<&TypeSpec> {
        self.specs.get(&type_id)
    }

    /// All configuration variants of type `type_id`
    #[inline]
    pub fn types(&self, type_id: u8) -> &[TableType] {
        self.types.get(&type_id).map(Vec::as_slice).unwrap_or_default()
    }

    #[inline]
    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.libraries
    }
}

/// One configuration variant of a resource
#[derive(Debug, Clone)]
pub struct Resource<'a> {
    pub package: &'a ResourcePackage,
    pub type_spec: &'a TypeSpec,
    pub table_type: &'a TableType,
    pub entry: ResourceEntry,
}

impl Resource<'_> {
    pub fn type_name(&self) -> &str {
        self.package
            .type_name(self.type_spec.id)
            .unwrap_or_default()
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    #[inline]
    pub fn config(&self) -> &ResTableConfig {
        &self.table_type.config
    }

    #[inline]
    pub fn locale(&self) -> Locale {
        self.table_type.config.locale()
    }

    #[inline]
    pub fn density(&self) -> u16 {
        self.table_type.config.density()
    }

    /// Render the value of this variant, maps are shown as `@type/key`
    pub fn to_string_value(&self, table: &ResourceTable, locale: Option<&Locale>) -> String {
        self.render(table, locale, &mut Vec::new())
    }

    fn render(&self, table: &ResourceTable, locale: Option<&Locale>, visited: &mut Vec<u32>) -> String {
        match &self.entry.value {
            EntryValue::Simple(value) => value.render(&table.string_pool, Some(table), locale, visited),
            EntryValue::Map { .. } => format!("@{}/{}", self.type_name(), self.key()),
        }
    }
}

/// Decoded `resources.arsc`
///
/// Entries are kept as raw bytes per configuration and decoded on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTable {
    /// Global pool with the string values of all packages
    pub string_pool: StringPool,

    packages: BTreeMap<u8, ResourcePackage>,
}

impl ResourceTable {
    /// A table without packages, for APKs that carry no resources
    pub fn empty() -> ResourceTable {
        ResourceTable::default()
    }

    pub fn parse(data: &[u8], interrupt: &Interrupt) -> Result<ResourceTable, ArscError> {
        let header = ChunkHeader::parse(&mut &data[..]).map_err(|e| ArscError::Header(e.into()))?;
        header.validate(data.len()).map_err(ArscError::Header)?;

        if header.kind != ChunkType::Table {
            warn!("resource table root has chunk type {:?}", header.kind);
        }

        let root = Chunk {
            header,
            offset: 0,
            data: &data[..header.size as usize],
        };

        let package_count = le_u32(&mut root.header_fields()).map_err(|e| ArscError::Header(e.into()))?;
        if package_count < 1 {
            warn!(
                "expected at least one resource package, but got {}",
                package_count
            );
        }

        let mut table = ResourceTable::default();
        let mut has_pool = false;

        for chunk in Chunks::new(root.body(), header.header_size as usize) {
            interrupt.check().map_err(|_| ArscError::Interrupted)?;
            let chunk = chunk.map_err(|(offset, source)| ArscError::Chunk { offset, source })?;

            match chunk.header.kind {
                ChunkType::StringPool if !has_pool => {
                    table.string_pool = StringPool::parse(chunk.data).map_err(|source| {
                        ArscError::StringPool {
                            offset: chunk.offset,
                            source,
                        }
                    })?;
                    has_pool = true;
                }
                ChunkType::TablePackage => {
                    let Some(package) = ResourcePackage::parse(&chunk, interrupt)? else {
                        continue;
                    };
                    info!("resource package 0x{:02x} {}", package.id, package.name);

                    match table.packages.get_mut(&package.id) {
                        Some(existing) => existing.merge(package),
                        None => {
                            table.packages.insert(package.id, package);
                        }
                    }
                }
                other => warn!("skipped table chunk {:?} at 0x{:x}", other, chunk.offset),
            }
        }

        if table.packages.len() != package_count as usize {
            debug!(
                "header declares {} packages, found {}",
                package_count,
                table.packages.len()
            );
        }

        Ok(table)
    }

    #[inline]
    pub fn package(&self, id: u8) -> Option<&ResourcePackage> {
        self.packages.get(&id)
    }

    pub fn packages(&self) -> impl Iterator<Item = &ResourcePackage> {
        self.packages.values()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Distinct locales of every configuration, in table order
    pub fn locales(&self) -> Vec<Locale> {
        let mut locales = Vec::new();

        let types = self
            .packages
            .values()
            .flat_map(|package| package.types.values().flatten());
        for table_type in types {
            let locale = table_type.config.locale();
            if !locales.contains(&locale) {
                locales.push(locale);
            }
        }

        locales
    }

    /// All configuration variants of resource `id`
    ///
    /// An entry whose value references its own id is left out.
    pub fn get_resources_by_id(&self, id: u32) -> Vec<Resource<'_>> {
        let (package_id, type_id, entry_id) = split_resource_id(id);

        let Some(package) = self.packages.get(&package_id) else {
            return Vec::new();
        };
        let Some(type_spec) = package.type_spec(type_id) else {
            return Vec::new();
        };
        if entry_id as usize >= type_spec.entry_count() {
            return Vec::new();
        }

        package
            .types(type_id)
            .iter()
            .filter_map(|table_type| {
                let entry = table_type.entry(entry_id, &package.key_strings)?;

                if entry.simple_value().and_then(|v| v.reference()) == Some(id) {
                    debug!("skipped self reference 0x{:08x} in {}", id, table_type.config);
                    return None;
                }

                Some(Resource {
                    package,
                    type_spec,
                    table_type,
                    entry,
                })
            })
            .collect()
    }

    /// Pick the variant of `id` that fits `locale` best
    ///
    /// A better locale match wins, ties go to the higher density.
    pub fn select(&self, id: u32, locale: Option<&Locale>) -> Option<Resource<'_>> {
        let mut selected: Option<(i32, i32, Resource<'_>)> = None;

        for resource in self.get_resources_by_id(id) {
            let locale_level = locale::match_level(locale, &resource.locale());
            let density_level = density_level(resource.density());

            let better = match &selected {
                None => true,
                Some((best_locale, best_density, _)) => {
                    locale_level > *best_locale
                        || (locale_level == *best_locale && density_level > *best_density)
                }
            };

            if better {
                selected = Some((locale_level, density_level, resource));
            }
        }

        selected.map(|(_, _, resource)| resource)
    }

    /// Render a reference to `id` for `locale`
    ///
    /// Without a locale the reference is shown as `@type/key`, unresolvable
    /// ids as `resourceId:0x...`.
    pub fn resolve_reference(&self, id: u32, locale: Option<&Locale>, visited: &mut Vec<u32>) -> String {
        let raw = format!("resourceId:0x{:x}", id);

        if visited.contains(&id) || visited.len() >= MAX_REFERENCE_DEPTH {
            warn!("reference chain through 0x{:08x} is cut off", id);
            return raw;
        }

        let Some(resource) = self.select(id, locale) else {
            return raw;
        };

        if locale.is_none() {
            return format!("@{}/{}", resource.type_name(), resource.key());
        }

        visited.push(id);
        let value = resource.render(self, locale, visited);
        visited.pop();

        value
    }
}

#[inline]
pub fn split_resource_id(id: u32) -> (u8, u8, u16) {
    ((id >> 24) as u8, ((id >> 16) & 0xff) as u8, (id & 0xffff) as u16)
}

fn density_level(density: u16) -> i32 {
    match density {
        Density::ANY | Density::NONE => -1,
        other => other as i32,
    }
}

fn chunk_error(chunk: &Chunk<'_>) -> impl FnOnce(ErrMode<ContextError>) -> ArscError {
    let offset = chunk.offset;
    move |e| ArscError::Chunk {
        offset,
        source: BufferError::from(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::fixtures::*;

    const REF: u8 = 0x01;
    const STRING: u8 = 0x03;

    fn sample() -> Vec<u8> {
        let strings = [
            "My App",
            "Mon App",
            "res/drawable-mdpi/icon.png",
            "res/drawable-xxhdpi/icon.png",
        ];

        let children = vec![
            type_spec(1, 6),
            table_type(
                1,
                "",
                "",
                0,
                &[
                    Some(simple_entry(0, STRING, 0)),
                    None,
                    Some(simple_entry(2, REF, 0x7f010002)),
                    Some(simple_entry(3, REF, 0x7f010000)),
                    Some(simple_entry(4, REF, 0x7f010005)),
                    Some(simple_entry(5, REF, 0x7f010004)),
                ],
            ),
            table_type(1, "fr", "", 0, &[Some(simple_entry(0, STRING, 1))]),
            type_spec(2, 2),
            table_type(2, "", "", 160, &[Some(simple_entry(6, STRING, 2))]),
            table_type(2, "", "", 480, &[Some(simple_entry(6, STRING, 3))]),
            table_type(
                2,
                "",
                "",
                0xffff,
                &[None, Some(map_entry(7, 0, &[(0x01010000, REF, 0x7f020000)]))],
            ),
        ];

        let package = package(
            0x7f,
            "com.example",
            &["string", "drawable"],
            &[
                "app_name", "unused", "self", "alias", "loop_a", "loop_b", "icon", "layered",
            ],
            &children,
        );

        table(&strings, &[package])
    }

    fn parse(data: &[u8]) -> ResourceTable {
        ResourceTable::parse(data, &Interrupt::none()).unwrap()
    }

    #[test]
    fn parses_packages() {
        let table = parse(&sample());

        assert_eq!(table.string_pool.len(), 4);
        let package = table.package(0x7f).unwrap();
        assert_eq!(package.name, "com.example");
        assert_eq!(package.type_name(1), Some("string"));
        assert_eq!(package.type_name(2), Some("drawable"));
        assert_eq!(package.types(1).len(), 2);
        assert!(package.types(9).is_empty());
    }

    #[test]
    fn resources_by_id() {
        let table = parse(&sample());

        let resources = table.get_resources_by_id(0x7f010000);
        assert_eq!(resources.len(), 2);
        assert!(resources.iter().all(|r| r.key() == "app_name"));
        assert_eq!(resources[1].locale(), Locale::new("fr", ""));

        // absent in every config
        assert!(table.get_resources_by_id(0x7f010001).is_empty());
        // beyond the entry count of the spec
        assert!(table.get_resources_by_id(0x7f01ffff).is_empty());
        assert!(table.get_resources_by_id(0x7f090000).is_empty());
        assert!(table.get_resources_by_id(0x01010000).is_empty());
    }

    #[test]
    fn lists_locales() {
        let table = parse(&sample());

        assert_eq!(table.locales(), [Locale::new("", ""), Locale::new("fr", "")]);
        assert!(ResourceTable::empty().locales().is_empty());
    }

    #[test]
    fn self_reference_is_excluded() {
        let table = parse(&sample());
        assert!(table.get_resources_by_id(0x7f010002).is_empty());
    }

    #[test]
    fn resolves_by_locale() {
        let table = parse(&sample());
        let resolve =
            |id, locale: Option<&Locale>| table.resolve_reference(id, locale, &mut Vec::new());

        assert_eq!(resolve(0x7f010000, Some(&Locale::en_us())), "My App");
        assert_eq!(resolve(0x7f010000, Some(&Locale::new("fr", "FR"))), "Mon App");
        assert_eq!(resolve(0x7f010000, None), "@string/app_name");
        assert_eq!(resolve(0x7f010003, Some(&Locale::en_us())), "My App");
        assert_eq!(resolve(0x7f0100ff, Some(&Locale::en_us())), "resourceId:0x7f0100ff");
    }

    #[test]
    fn higher_density_wins_on_equal_locale() {
        let table = parse(&sample());

        assert_eq!(
            table.resolve_reference(0x7f020000, Some(&Locale::en_us()), &mut Vec::new()),
            "res/drawable-xxhdpi/icon.png"
        );
    }

    #[test]
    fn map_entry_renders_as_reference_name() {
        let table = parse(&sample());

        let resources = table.get_resources_by_id(0x7f020001);
        assert_eq!(resources.len(), 1);
        assert!(resources[0].entry.is_complex());
        assert_eq!(
            table.resolve_reference(0x7f020001, Some(&Locale::en_us()), &mut Vec::new()),
            "@drawable/layered"
        );
    }

    #[test]
    fn reference_cycle_is_cut() {
        let table = parse(&sample());

        assert_eq!(
            table.resolve_reference(0x7f010004, Some(&Locale::en_us()), &mut Vec::new()),
            "resourceId:0x7f010004"
        );
    }

    #[test]
    fn decoding_is_idempotent() {
        let data = sample();
        assert_eq!(parse(&data), parse(&data));
    }

    #[test]
    fn duplicate_package_ids_are_merged() {
        let first = package(
            0x7f,
            "a",
            &["string"],
            &["one"],
            &[
                type_spec(1, 1),
                table_type(1, "", "", 0, &[Some(simple_entry(0, STRING, 0))]),
            ],
        );
        let second = package(
            0x7f,
            "a",
            &["string", "color"],
            &["one"],
            &[
                type_spec(2, 1),
                table_type(2, "", "", 0, &[Some(simple_entry(0, 0x1c, 0xff000000))]),
            ],
        );
        let data = table(&["x"], &[first, second]);

        let table = parse(&data);
        assert_eq!(table.packages().count(), 1);
        assert_eq!(table.get_resources_by_id(0x7f010000).len(), 1);
        assert_eq!(table.get_resources_by_id(0x7f020000).len(), 1);
    }

    #[test]
    fn oversized_type_id_offset_finds_no_type() {
        let children = [
            type_spec(1, 1),
            table_type(1, "", "", 0, &[Some(simple_entry(0, STRING, 0))]),
        ];
        let mut pkg = package(0x7f, "a", &["string"], &["one"], &children);
        // typeIdOffset
        pkg[284..288].copy_from_slice(&u32::MAX.to_le_bytes());

        let table = parse(&table(&["x"], &[pkg]));
        let package = table.package(0x7f).unwrap();
        assert_eq!(package.type_name(1), None);
        assert_eq!(package.type_name(0xff), None);

        assert_eq!(table.resolve_reference(0x7f010000, None, &mut Vec::new()), "@/one");
    }

    #[test]
    fn package_id_beyond_byte_is_skipped() {
        let wide = package(
            0x17f,
            "wide",
            &["string"],
            &["other"],
            &[
                type_spec(1, 1),
                table_type(1, "", "", 0, &[Some(simple_entry(0, STRING, 1))]),
            ],
        );
        let app = package(
            0x7f,
            "com.example",
            &["string"],
            &["one"],
            &[
                type_spec(1, 1),
                table_type(1, "", "", 0, &[Some(simple_entry(0, STRING, 0))]),
            ],
        );

        let table = parse(&table(&["x", "y"], &[app, wide]));
        assert_eq!(table.packages().count(), 1);
        let package = table.package(0x7f).unwrap();
        assert_eq!(package.name, "com.example");
        let resources = table.get_resources_by_id(0x7f010000);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].key(), "one");
    }

    #[test]
    fn interrupt_stops_decoding() {
        let interrupt = Interrupt::new(Arc::new(AtomicBool::new(true)));

        assert_eq!(
            ResourceTable::parse(&sample(), &interrupt),
            Err(ArscError::Interrupted)
        );
    }

    #[test]
    fn corrupt_child_header_aborts() {
        let mut data = sample();
        // header size of the global string pool
        data[14..16].copy_from_slice(&0xffffu16.to_le_bytes());

        assert!(matches!(
            ResourceTable::parse(&data, &Interrupt::none()),
            Err(ArscError::Chunk { offset: 12, .. })
        ));
    }

    #[test]
    fn truncated_table_never_panics() {
        let data = sample();

        for end in 0..data.len() {
            assert!(ResourceTable::parse(&data[..end], &Interrupt::none()).is_err());
        }
    }

    #[test]
    fn empty_table() {
        let table = ResourceTable::empty();

        assert!(table.is_empty());
        assert!(table.get_resources_by_id(0x7f010000).is_empty());
        assert_eq!(
            table.resolve_reference(0x7f010000, Some(&Locale::en_us()), &mut Vec::new()),
            "resourceId:0x7f010000"
        );
    }

    #[test]
    fn splits_ids() {
        assert_eq!(split_resource_id(0x7f020003), (0x7f, 0x02, 0x0003));
    }
}
