//! Writers of synthetic resource tables and binary XML documents.
//!
//! Only built for tests and for crates that enable the `fixtures` feature.

use std::collections::HashMap;

use crate::axml::ANDROID_NAMESPACE;
use crate::structs::{ChunkHeader, EntryFlags, NO_STRING, StringPool, TableType, TypeFlags};

/// Chunk with the given extended header and body
pub fn write_chunk(kind: u16, header_fields: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = ChunkHeader::SIZE + header_fields.len();
    let size = header_size + body.len();

    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&(header_size as u16).to_le_bytes());
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out.extend_from_slice(header_fields);
    out.extend_from_slice(body);
    out
}

/// `ResTable_config` of the current 64-byte layout
pub fn write_config(language: &str, country: &str, density: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&64u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let mut locale = [0u8; 4];
    let language = &language.as_bytes()[..language.len().min(2)];
    let country = &country.as_bytes()[..country.len().min(2)];
    locale[..language.len()].copy_from_slice(language);
    locale[2..2 + country.len()].copy_from_slice(country);
    out.extend_from_slice(&locale);

    out.extend_from_slice(&((density as u32) << 16).to_le_bytes());
    out.resize(64, 0);
    out
}

fn write_value(out: &mut Vec<u8>, data_type: u8, data: u32) {
    out.extend_from_slice(&8u16.to_le_bytes());
    out.push(0);
    out.push(data_type);
    out.extend_from_slice(&data.to_le_bytes());
}

pub fn type_spec(id: u8, entry_count: u32) -> Vec<u8> {
    let mut fields = vec![id, 0, 0, 0];
    fields.extend_from_slice(&entry_count.to_le_bytes());

    let body = vec![0u8; entry_count as usize * 4];
    write_chunk(0x0202, &fields, &body)
}

/// Entry holding a single value
pub fn simple_entry(key: u32, data_type: u8, data: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&key.to_le_bytes());
    write_value(&mut out, data_type, data);
    out
}

/// Map entry with `(name, type, data)` pairs
pub fn map_entry(key: u32, parent: u32, pairs: &[(u32, u8, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(&EntryFlags::COMPLEX.bits().to_le_bytes());
    out.extend_from_slice(&key.to_le_bytes());
    out.extend_from_slice(&parent.to_le_bytes());
    out.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
    for (name, data_type, data) in pairs {
        out.extend_from_slice(&name.to_le_bytes());
        write_value(&mut out, *data_type, *data);
    }
    out
}

/// Dense `TABLE_TYPE` chunk, `None` entries are written as absent
pub fn table_type(
    id: u8,
    language: &str,
    country: &str,
    density: u16,
    entries: &[Option<Vec<u8>>],
) -> Vec<u8> {
    let config = write_config(language, country, density);
    let header_size = ChunkHeader::SIZE + 12 + config.len();
    let entries_start = header_size + entries.len() * 4;

    let mut fields = vec![id, 0, 0, 0];
    fields.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    fields.extend_from_slice(&(entries_start as u32).to_le_bytes());
    fields.extend_from_slice(&config);

    let mut offsets = Vec::new();
    let mut data = Vec::new();
    for entry in entries {
        match entry {
            Some(entry) => {
                offsets.extend_from_slice(&(data.len() as u32).to_le_bytes());
                data.extend_from_slice(entry);
            }
            None => offsets.extend_from_slice(&TableType::NO_ENTRY.to_le_bytes()),
        }
    }
    offsets.extend(data);

    write_chunk(0x0201, &fields, &offsets)
}

/// Sparse `TABLE_TYPE` chunk of the default config
pub fn sparse_table_type(id: u8, entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let config = write_config("", "", 0);
    let header_size = ChunkHeader::SIZE + 12 + config.len();
    let entries_start = header_size + entries.len() * 4;

    let mut fields = vec![id, TypeFlags::SPARSE.bits(), 0, 0];
    fields.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    fields.extend_from_slice(&(entries_start as u32).to_le_bytes());
    fields.extend_from_slice(&config);

    let mut index = Vec::new();
    let mut data = Vec::new();
    for (idx, entry) in entries {
        index.extend_from_slice(&idx.to_le_bytes());
        index.extend_from_slice(&((data.len() / 4) as u16).to_le_bytes());
        data.extend_from_slice(entry);
    }
    index.extend(data);

    write_chunk(0x0201, &fields, &index)
}

/// `TABLE_PACKAGE` chunk with the given type and key pools followed by `children`
pub fn package(id: u32, name: &str, types: &[&str], keys: &[&str], children: &[Vec<u8>]) -> Vec<u8> {
    const HEADER_SIZE: usize = ChunkHeader::SIZE + 4 + 256 + 4 * 5;

    let type_pool = StringPool::encode(types, false).unwrap_or_default();
    let key_pool = StringPool::encode(keys, true).unwrap_or_default();

    let mut fields = Vec::new();
    fields.extend_from_slice(&id.to_le_bytes());

    let mut raw_name = [0u8; 256];
    for (i, unit) in name.encode_utf16().take(127).enumerate() {
        raw_name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    fields.extend_from_slice(&raw_name);
    fields.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
    fields.extend_from_slice(&0u32.to_le_bytes());
    fields.extend_from_slice(&((HEADER_SIZE + type_pool.len()) as u32).to_le_bytes());
    fields.extend_from_slice(&0u32.to_le_bytes());
    fields.extend_from_slice(&0u32.to_le_bytes());

    let mut body = type_pool;
    body.extend(key_pool);
    for child in children {
        body.extend_from_slice(child);
    }

    write_chunk(0x0200, &fields, &body)
}

/// `TABLE` chunk with a global UTF-8 pool followed by `packages`
pub fn table(strings: &[&str], packages: &[Vec<u8>]) -> Vec<u8> {
    let mut body = StringPool::encode(strings, true).unwrap_or_default();
    for package in packages {
        body.extend_from_slice(package);
    }

    write_chunk(0x0002, &(packages.len() as u32).to_le_bytes(), &body)
}

/// Attribute of a start tag written by [`XmlWriter`]
#[derive(Debug, Clone)]
pub struct Attr {
    pub namespace: Option<String>,
    pub name: String,

    /// Raw string value, written as a `String` typed value too
    pub raw: Option<String>,

    pub data_type: u8,
    pub data: u32,
}

impl Attr {
    /// `android:` attribute with a string value
    pub fn string(name: &str, value: &str) -> Attr {
        Attr {
            namespace: Some(ANDROID_NAMESPACE.to_owned()),
            name: name.to_owned(),
            raw: Some(value.to_owned()),
            data_type: 0x03,
            data: 0,
        }
    }

    /// `android:` attribute with a typed value
    pub fn typed(name: &str, data_type: u8, data: u32) -> Attr {
        Attr {
            namespace: Some(ANDROID_NAMESPACE.to_owned()),
            name: name.to_owned(),
            raw: None,
            data_type,
            data,
        }
    }

    /// Attribute without namespace, like `package`
    pub fn plain(name: &str, value: &str) -> Attr {
        Attr {
            namespace: None,
            ..Attr::string(name, value)
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    StartNamespace(String, String),
    EndNamespace(String, String),
    Start(String, Vec<Attr>),
    End(String),
    Text(String),
}

/// Builder of binary XML documents
#[derive(Debug, Clone, Default)]
pub struct XmlWriter {
    nodes: Vec<Node>,
    attribute_ids: Vec<(String, u32)>,
    strip_names: bool,
}

impl XmlWriter {
    pub fn new() -> XmlWriter {
        XmlWriter::default()
    }

    /// Bind attribute `name` to a framework id in the resource map
    pub fn attribute_id(mut self, name: &str, id: u32) -> XmlWriter {
        self.attribute_ids.push((name.to_owned(), id));
        self
    }

    /// Write names of attributes with an id as empty strings, like obfuscators do
    pub fn strip_names(mut self) -> XmlWriter {
        self.strip_names = true;
        self
    }

    pub fn start_namespace(mut self, prefix: &str, uri: &str) -> XmlWriter {
        self.nodes
            .push(Node::StartNamespace(prefix.to_owned(), uri.to_owned()));
        self
    }

    pub fn end_namespace(mut self, prefix: &str, uri: &str) -> XmlWriter {
        self.nodes
            .push(Node::EndNamespace(prefix.to_owned(), uri.to_owned()));
        self
    }

    pub fn start(mut self, name: &str, attributes: Vec<Attr>) -> XmlWriter {
        self.nodes.push(Node::Start(name.to_owned(), attributes));
        self
    }

    pub fn end(mut self, name: &str) -> XmlWriter {
        self.nodes.push(Node::End(name.to_owned()));
        self
    }

    pub fn text(mut self, text: &str) -> XmlWriter {
        self.nodes.push(Node::Text(text.to_owned()));
        self
    }

    /// Serialize the whole document
    pub fn build(&self) -> Vec<u8> {
        let mut strings: Vec<String> = Vec::new();
        let mut index: HashMap<String, u32> = HashMap::new();
        let mut attribute_names: HashMap<String, u32> = HashMap::new();

        // names bound to ids come first, parallel to the resource map
        for (name, _) in &self.attribute_ids {
            attribute_names.insert(name.clone(), strings.len() as u32);
            strings.push(if self.strip_names {
                String::new()
            } else {
                name.clone()
            });
        }

        let mut intern = |s: &str| -> u32 {
            if let Some(idx) = index.get(s) {
                return *idx;
            }
            let idx = strings.len() as u32;
            strings.push(s.to_owned());
            index.insert(s.to_owned(), idx);
            idx
        };

        let mut nodes = Vec::new();
        for node in &self.nodes {
            let (kind, body) = match node {
                Node::StartNamespace(prefix, uri) | Node::EndNamespace(prefix, uri) => {
                    let mut body = intern(prefix).to_le_bytes().to_vec();
                    body.extend_from_slice(&intern(uri).to_le_bytes());

                    let kind = if matches!(node, Node::StartNamespace(..)) {
                        0x0100
                    } else {
                        0x0101
                    };
                    (kind, body)
                }
                Node::Start(name, attributes) => {
                    let mut body = Vec::new();
                    body.extend_from_slice(&NO_STRING.to_le_bytes());
                    body.extend_from_slice(&intern(name).to_le_bytes());
                    body.extend_from_slice(&20u16.to_le_bytes());
                    body.extend_from_slice(&20u16.to_le_bytes());
                    body.extend_from_slice(&(attributes.len() as u16).to_le_bytes());
                    body.extend_from_slice(&[0u8; 6]);

                    for attr in attributes {
                        let namespace = attr.namespace.as_deref().map_or(NO_STRING, &mut intern);
                        let name = match attribute_names.get(&attr.name) {
                            Some(idx) => *idx,
                            None => intern(&attr.name),
                        };
                        let raw = attr.raw.as_deref().map_or(NO_STRING, &mut intern);
                        let data = if attr.raw.is_some() { raw } else { attr.data };

                        body.extend_from_slice(&namespace.to_le_bytes());
                        body.extend_from_slice(&name.to_le_bytes());
                        body.extend_from_slice(&raw.to_le_bytes());
                        write_value(&mut body, attr.data_type, data);
                    }
                    (0x0102, body)
                }
                Node::End(name) => {
                    let mut body = NO_STRING.to_le_bytes().to_vec();
                    body.extend_from_slice(&intern(name).to_le_bytes());
                    (0x0103, body)
                }
                Node::Text(text) => {
                    let mut body = intern(text).to_le_bytes().to_vec();
                    write_value(&mut body, 0x00, 0);
                    (0x0104, body)
                }
            };

            let mut fields = 1u32.to_le_bytes().to_vec();
            fields.extend_from_slice(&NO_STRING.to_le_bytes());
            nodes.extend(write_chunk(kind, &fields, &body));
        }

        let ids: Vec<u8> = self
            .attribute_ids
            .iter()
            .flat_map(|(_, id)| id.to_le_bytes())
            .collect();

        let mut body = StringPool::encode(&strings, false).unwrap_or_default();
        body.extend(write_chunk(0x0180, &[], &ids));
        body.extend(nodes);

        write_chunk(0x0003, &[], &body)
    }
}
