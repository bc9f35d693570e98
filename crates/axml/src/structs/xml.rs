use apkparse_buffer::{corrupt, le_u16, le_u32, window};
use winnow::prelude::*;

use crate::structs::{Chunk, ResourceValue, ValueType};

/// Index value meaning "no string"
pub const NO_STRING: u32 = u32::MAX;

/// Optional string index, `NO_STRING` becomes `None`
#[inline]
pub(crate) fn string_ref(idx: u32) -> Option<u32> {
    (idx != NO_STRING).then_some(idx)
}

/// Common part of every xml node chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeHeader {
    /// Line number in original source file at which this element appeared
    pub line_number: u32,

    /// Optional XML comment that was associated with this element; -1 if none
    pub comment: u32,
}

impl NodeHeader {
    /// Size of a node chunk header, anything else is not a node
    pub const CHUNK_HEADER_SIZE: u16 = 16;

    #[inline]
    pub fn parse(chunk: &Chunk<'_>) -> ModalResult<NodeHeader> {
        (le_u32, le_u32)
            .map(|(line_number, comment)| NodeHeader {
                line_number,
                comment,
            })
            .parse_next(&mut chunk.header_fields())
    }
}

/// Ids of the attribute names, parallel to the first strings of the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    pub resource_ids: Vec<u32>,
}

impl ResourceMap {
    pub fn parse(chunk: &Chunk<'_>) -> ResourceMap {
        let resource_ids = chunk
            .body()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        ResourceMap { resource_ids }
    }

    #[inline]
    pub fn get(&self, idx: u32) -> Option<u32> {
        self.resource_ids.get(idx as usize).copied()
    }
}

/// Start or end of a namespace scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNamespace {
    pub prefix: u32,
    pub uri: u32,
}

impl RawNamespace {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<RawNamespace> {
        (le_u32, le_u32)
            .map(|(prefix, uri)| RawNamespace { prefix, uri })
            .parse_next(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute {
    /// Namespace of this attribute
    pub namespace: u32,

    /// Name of this attribute
    pub name: u32,

    /// The original raw string value of this attribute
    pub raw_value: u32,

    /// Processed typed value of this attribute
    pub typed_value: ResourceValue,
}

impl RawAttribute {
    /// Size of the attribute record written by aapt
    pub const SIZE: usize = 4 * 3 + ResourceValue::SIZE;

    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<RawAttribute> {
        (le_u32, le_u32, le_u32, ResourceValue::parse)
            .map(|(namespace, name, raw_value, typed_value)| RawAttribute {
                namespace,
                name,
                raw_value,
                typed_value,
            })
            .parse_next(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStartElement {
    /// String of the full namespace of this element
    pub namespace: u32,

    /// String name of this node
    pub name: u32,

    /// Index (1-based) of the "id" attribute. 0 if none.
    pub id_index: u16,

    /// Index (1-based) of the "class" attribute. 0 if none.
    pub class_index: u16,

    /// Index (1-based) of the "style" attribute. 0 if none.
    pub style_index: u16,

    pub attributes: Vec<RawAttribute>,
}

impl RawStartElement {
    /// Parse a start element from the body of its chunk
    ///
    /// Attributes are read at `attribute_start` with a stride of `attribute_size`,
    /// padding between records and after the last one is ignored.
    pub fn parse(body: &[u8]) -> ModalResult<RawStartElement> {
        let input = &mut &body[..];

        let (namespace, name, attribute_start, attribute_size, attribute_count) =
            (le_u32, le_u32, le_u16, le_u16, le_u16).parse_next(input)?;
        let (id_index, class_index, style_index) = (le_u16, le_u16, le_u16).parse_next(input)?;

        let attribute_size = attribute_size as usize;
        if attribute_count > 0 && attribute_size < RawAttribute::SIZE {
            return Err(corrupt());
        }

        let raw = window(
            body,
            attribute_start as usize,
            attribute_count as usize * attribute_size,
        )?;

        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for mut record in raw.chunks_exact(attribute_size.max(1)) {
            attributes.push(RawAttribute::parse(&mut record)?);
        }

        Ok(RawStartElement {
            namespace,
            name,
            id_index,
            class_index,
            style_index,
            attributes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEndElement {
    pub namespace: u32,
    pub name: u32,
}

impl RawEndElement {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<RawEndElement> {
        (le_u32, le_u32)
            .map(|(namespace, name)| RawEndElement { namespace, name })
            .parse_next(input)
    }
}

/// Character data node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCData {
    /// The raw CDATA character data
    pub data: u32,

    /// The typed value of the character data if this is a CDATA node
    pub typed_data: ResourceValue,
}

impl RawCData {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<RawCData> {
        (le_u32, ResourceValue::parse)
            .map(|(data, typed_data)| RawCData { data, typed_data })
            .parse_next(input)
    }
}

/// Decoded attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Namespace uri
    pub namespace: Option<String>,

    /// Prefix bound to `namespace` at this point of the document
    pub prefix: Option<String>,

    pub name: String,

    /// Rendered value, the raw string if there is one
    pub value: String,

    pub typed_value: ResourceValue,
}

impl Attribute {
    /// `prefix:name`, or the bare name
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

/// Decoded start of an element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartTag {
    pub namespace: Option<String>,
    pub name: String,
    pub line_number: u32,
    pub attributes: Vec<Attribute>,
}

impl StartTag {
    /// Attribute by its local name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|attr| attr.value.as_str())
    }

    /// `true` only for a case-insensitive `"true"`, `default` if absent
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name)
            .map_or(default, |value| value.eq_ignore_ascii_case("true"))
    }

    /// Integer value, decimal or `0x` hex
    pub fn get_long(&self, name: &str) -> Option<i64> {
        let value = self.get(name)?.trim();

        match value.strip_prefix("0x") {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => value.parse().ok(),
        }
    }

    #[inline]
    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get_long(name).map(|v| v as i32)
    }

    /// Referenced resource id of an attribute, if its typed value is a reference
    pub fn get_reference(&self, name: &str) -> Option<u32> {
        let attr = self.attribute(name)?;

        match attr.typed_value.data_type {
            ValueType::Reference | ValueType::DynamicReference => attr.typed_value.reference(),
            _ => None,
        }
    }
}

/// Decoded end of an element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndTag {
    pub namespace: Option<String>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_element(attribute_start: u16, attribute_size: u16, attributes: &[[u32; 5]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&NO_STRING.to_le_bytes());
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(&attribute_start.to_le_bytes());
        out.extend_from_slice(&attribute_size.to_le_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 6]);
        out.resize(attribute_start as usize, 0xee);

        for [ns, name, raw, data_type, data] in attributes {
            let start = out.len();
            out.extend_from_slice(&ns.to_le_bytes());
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&raw.to_le_bytes());
            out.extend_from_slice(&8u16.to_le_bytes());
            out.push(0);
            out.push(*data_type as u8);
            out.extend_from_slice(&data.to_le_bytes());
            out.resize(start + attribute_size as usize, 0xee);
        }
        out
    }

    #[test]
    fn parses_attributes() {
        let body = start_element(20, 20, &[[1, 2, NO_STRING, 0x10, 21], [1, 4, 5, 0x03, 5]]);
        let element = RawStartElement::parse(&body).unwrap();

        assert_eq!(element.name, 3);
        assert_eq!(string_ref(element.namespace), None);
        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attributes[0].typed_value.data, 21);
        assert_eq!(string_ref(element.attributes[0].raw_value), None);
        assert_eq!(element.attributes[1].name, 4);
    }

    #[test]
    fn padded_attribute_layout() {
        // attributes start late and have trailing padding
        let body = start_element(28, 24, &[[1, 2, NO_STRING, 0x12, 1], [1, 6, NO_STRING, 0x12, 0]]);
        let element = RawStartElement::parse(&body).unwrap();

        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attributes[1].name, 6);
        assert_eq!(element.attributes[1].typed_value.data_type, ValueType::Boolean);
    }

    #[test]
    fn short_attribute_size_is_corrupt() {
        let body = start_element(20, 20, &[[1, 2, NO_STRING, 0x10, 1]]);
        let mut body = body;
        body[10..12].copy_from_slice(&8u16.to_le_bytes());

        assert!(matches!(
            RawStartElement::parse(&body),
            Err(winnow::error::ErrMode::Cut(_))
        ));
    }

    #[test]
    fn truncated_attributes() {
        let body = start_element(20, 20, &[[1, 2, NO_STRING, 0x10, 1]]);
        assert!(RawStartElement::parse(&body[..30]).is_err());
    }

    fn tag() -> StartTag {
        let attr = |name: &str, value: &str, data_type| Attribute {
            namespace: None,
            prefix: Some("android".to_owned()),
            name: name.to_owned(),
            value: value.to_owned(),
            typed_value: ResourceValue::new(data_type, 0x7f010000),
        };

        StartTag {
            namespace: None,
            name: "application".to_owned(),
            line_number: 1,
            attributes: vec![
                attr("debuggable", "TRUE", ValueType::Boolean),
                attr("versionCode", "0x10", ValueType::Hex),
                attr("minSdkVersion", "21", ValueType::Dec),
                attr("icon", "@drawable/icon", ValueType::Reference),
            ],
        }
    }

    #[test]
    fn attribute_getters() {
        let tag = tag();

        assert!(tag.get_bool("debuggable", false));
        assert!(tag.get_bool("missing", true));
        assert_eq!(tag.get_long("versionCode"), Some(16));
        assert_eq!(tag.get_int("minSdkVersion"), Some(21));
        assert_eq!(tag.get_int("icon"), None);
        assert_eq!(tag.get_reference("icon"), Some(0x7f010000));
        assert_eq!(tag.get_reference("minSdkVersion"), None);
        assert_eq!(tag.attributes[0].qualified_name(), "android:debuggable");
    }
}
