use apkparse_buffer::{BufferError, Interrupt};
use log::{debug, warn};
use winnow::error::{ContextError, ErrMode};

use crate::arsc::ResourceTable;
use crate::attrs;
use crate::errors::AxmlError;
use crate::locale::Locale;
use crate::printer::XmlPrinter;
use crate::sink::XmlSink;
use crate::structs::{
    Attribute, Chunk, ChunkHeader, ChunkType, Chunks, EndTag, NodeHeader, RawAttribute,
    RawCData, RawEndElement, RawNamespace, RawStartElement, ResourceMap, ResourceValue,
    StartTag, StringPool, ValueType, string_ref,
};

pub const ANDROID_NAMESPACE: &str = "http://schemas.android.com/apk/res/android";

/// Streaming decoder of binary XML documents
///
/// Attribute values that reference resources are resolved through the
/// resource table for the preferred locale, when one is attached.
#[derive(Debug, Clone, Default)]
pub struct AxmlDecoder<'a> {
    table: Option<&'a ResourceTable>,
    locale: Option<&'a Locale>,
    interrupt: Interrupt,
}

/// Per-document decoding state
struct Document<'d> {
    strings: &'d StringPool,
    resource_map: &'d ResourceMap,

    /// Namespaces in scope as `(prefix, uri)`
    namespaces: Vec<(String, String)>,
}

impl<'a> AxmlDecoder<'a> {
    pub fn new() -> AxmlDecoder<'a> {
        AxmlDecoder::default()
    }

    /// Resolve references through `table`, `None` locale renders them as `@type/key`
    pub fn with_resources(mut self, table: &'a ResourceTable, locale: Option<&'a Locale>) -> Self {
        self.table = Some(table);
        self.locale = locale;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Decode `data` and feed its events to `sink`
    pub fn decode(&self, data: &[u8], sink: &mut dyn XmlSink) -> Result<(), AxmlError> {
        // basic sanity check
        if data.len() < ChunkHeader::SIZE {
            return Err(AxmlError::TooSmall);
        }

        let header = ChunkHeader::parse(&mut &data[..]).map_err(|_| AxmlError::TooSmall)?;

        // header size must be 8 bytes, otherwise is non valid axml
        if header.header_size as usize != ChunkHeader::SIZE {
            return Err(AxmlError::HeaderSize(header.header_size));
        }

        // some malware tamper this parameter
        if header.kind != ChunkType::Xml {
            warn!("binary xml root has chunk type {:?}", header.kind);
        }

        let size = header.size as usize;
        let end = if size > data.len() {
            warn!("binary xml declares {} bytes, got {}", size, data.len());
            data.len()
        } else {
            size.max(ChunkHeader::SIZE)
        };

        let mut strings: Option<StringPool> = None;
        let mut resource_map = ResourceMap::default();
        let mut namespaces = Vec::new();

        for chunk in Chunks::new(&data[ChunkHeader::SIZE..end], ChunkHeader::SIZE) {
            self.interrupt.check().map_err(|_| AxmlError::Interrupted)?;
            let chunk = chunk.map_err(|(offset, source)| AxmlError::Chunk { offset, source })?;

            match chunk.header.kind {
                ChunkType::StringPool if strings.is_none() => {
                    let pool = StringPool::parse(chunk.data).map_err(|source| {
                        AxmlError::StringPool {
                            offset: chunk.offset,
                            source,
                        }
                    })?;

                    debug!("binary xml string pool with {} strings", pool.len());
                    strings = Some(pool);
                }
                ChunkType::XmlResourceMap => {
                    resource_map = ResourceMap::parse(&chunk);
                }
                kind if kind.is_xml_node() => {
                    let Some(strings) = strings.as_ref() else {
                        return Err(AxmlError::MissingStringPool);
                    };

                    // another junk malware techniques
                    if chunk.header.header_size != NodeHeader::CHUNK_HEADER_SIZE {
                        warn!(
                            "xml node at 0x{:x} has header size {}, skipped",
                            chunk.offset, chunk.header.header_size
                        );
                        continue;
                    }

                    let mut document = Document {
                        strings,
                        resource_map: &resource_map,
                        namespaces: std::mem::take(&mut namespaces),
                    };
                    let result = self.node(&chunk, &mut document, sink);
                    namespaces = document.namespaces;
                    result?;
                }
                other => warn!("not a xml node chunk {:?} at 0x{:x}", other, chunk.offset),
            }
        }

        Ok(())
    }

    /// Decode `data` into readable XML text
    pub fn to_xml(&self, data: &[u8]) -> Result<String, AxmlError> {
        let mut printer = XmlPrinter::new();
        self.decode(data, &mut printer)?;

        Ok(printer.into_string())
    }

    fn node(
        &self,
        chunk: &Chunk<'_>,
        document: &mut Document<'_>,
        sink: &mut dyn XmlSink,
    ) -> Result<(), AxmlError> {
        let error = |e: ErrMode<ContextError>| AxmlError::Chunk {
            offset: chunk.offset,
            source: BufferError::from(e),
        };

        let node = NodeHeader::parse(chunk).map_err(error)?;
        let body = chunk.body();

        match chunk.header.kind {
            ChunkType::XmlStartNamespace => {
                let raw = RawNamespace::parse(&mut &body[..]).map_err(error)?;
                let prefix = document.string(raw.prefix).unwrap_or_default();
                let uri = document.string(raw.uri).unwrap_or_default();

                sink.on_namespace_start(&prefix, &uri);
                document.namespaces.push((prefix, uri));
            }
            ChunkType::XmlEndNamespace => {
                let raw = RawNamespace::parse(&mut &body[..]).map_err(error)?;
                let prefix = document.string(raw.prefix).unwrap_or_default();
                let uri = document.string(raw.uri).unwrap_or_default();

                if let Some(idx) = document.namespaces.iter().rposition(|(_, u)| *u == uri) {
                    document.namespaces.remove(idx);
                }
                sink.on_namespace_end(&prefix, &uri);
            }
            ChunkType::XmlStartElement => {
                let raw = RawStartElement::parse(body).map_err(error)?;

                let attributes = raw
                    .attributes
                    .iter()
                    .filter_map(|attr| self.attribute(attr, document))
                    .collect();

                let tag = StartTag {
                    namespace: document.string(raw.namespace),
                    name: document.string(raw.name).unwrap_or_default(),
                    line_number: node.line_number,
                    attributes,
                };
                sink.on_start_tag(&tag);
            }
            ChunkType::XmlEndElement => {
                let raw = RawEndElement::parse(&mut &body[..]).map_err(error)?;

                let tag = EndTag {
                    namespace: document.string(raw.namespace),
                    name: document.string(raw.name).unwrap_or_default(),
                };
                sink.on_end_tag(&tag);
            }
            ChunkType::XmlCdata => {
                let raw = RawCData::parse(&mut &body[..]).map_err(error)?;

                if let Some(text) = document.string(raw.data) {
                    sink.on_text(&text);
                }
            }
            other => debug!("ignored xml node {:?} at 0x{:x}", other, chunk.offset),
        }

        Ok(())
    }

    fn attribute(&self, raw: &RawAttribute, document: &Document<'_>) -> Option<Attribute> {
        let name = match document.string(raw.name).filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => {
                let name = document
                    .resource_map
                    .get(raw.name)
                    .and_then(attrs::framework_attr_name);

                match name {
                    Some(name) => name.to_owned(),
                    None => {
                        warn!("attribute name {} can't be resolved", raw.name);
                        return None;
                    }
                }
            }
        };

        // skip garbage strings
        if name.contains(char::is_whitespace) {
            warn!("skipped garbage attribute name: {:?}", name);
            return None;
        }

        let namespace = document.string(raw.namespace);
        let prefix = namespace.as_deref().and_then(|uri| document.prefix_of(uri));

        let value = match document.string(raw.raw_value) {
            Some(value) => value,
            None => self.render(&name, &raw.typed_value, document.strings),
        };

        Some(Attribute {
            namespace,
            prefix,
            name,
            value,
            typed_value: raw.typed_value,
        })
    }

    fn render(&self, name: &str, value: &ResourceValue, strings: &StringPool) -> String {
        if matches!(value.data_type, ValueType::Dec | ValueType::Hex)
            && let Some(symbolic) = attrs::format_value(name, value.data)
        {
            return symbolic;
        }

        value.to_string_value(strings, self.table, self.locale)
    }
}

impl Document<'_> {
    /// String at `idx`, `None` for the "no string" index
    fn string(&self, idx: u32) -> Option<String> {
        string_ref(idx)
            .and_then(|idx| self.strings.get(idx))
            .map(str::to_owned)
    }

    fn prefix_of(&self, uri: &str) -> Option<String> {
        self.namespaces
            .iter()
            .rev()
            .find(|(_, u)| u == uri)
            .map(|(prefix, _)| prefix.clone())
    }
}
