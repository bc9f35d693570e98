use serde::Serialize;

use crate::sink::XmlSink;
use crate::structs::{EndTag, StartTag};

/// Layers of an `<adaptive-icon>` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdaptiveIconLayers {
    pub foreground: Option<String>,
    pub background: Option<String>,
}

impl AdaptiveIconLayers {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.foreground.is_none() && self.background.is_none()
    }
}

/// Sink collecting the drawables of the foreground and background layers
#[derive(Debug, Default)]
pub struct AdaptiveIconSink {
    layers: AdaptiveIconLayers,
}

impl AdaptiveIconSink {
    pub fn new() -> AdaptiveIconSink {
        AdaptiveIconSink::default()
    }

    pub fn into_layers(self) -> AdaptiveIconLayers {
        self.layers
    }
}

impl XmlSink for AdaptiveIconSink {
    fn on_start_tag(&mut self, tag: &StartTag) {
        let drawable = || tag.get("drawable").map(str::to_owned);

        match tag.name.as_str() {
            "background" => self.layers.background = drawable(),
            "foreground" => self.layers.foreground = drawable(),
            _ => {}
        }
    }

    fn on_end_tag(&mut self, _tag: &EndTag) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Attribute, ResourceValue, ValueType};

    fn layer(name: &str, drawable: &str) -> StartTag {
        StartTag {
            name: name.to_owned(),
            attributes: vec![Attribute {
                namespace: None,
                prefix: Some("android".to_owned()),
                name: "drawable".to_owned(),
                value: drawable.to_owned(),
                typed_value: ResourceValue::new(ValueType::Reference, 0x7f020000),
            }],
            ..StartTag::default()
        }
    }

    #[test]
    fn collects_layers() {
        let mut sink = AdaptiveIconSink::new();
        sink.on_start_tag(&StartTag {
            name: "adaptive-icon".to_owned(),
            ..StartTag::default()
        });
        sink.on_start_tag(&layer("background", "res/bg.png"));
        sink.on_start_tag(&layer("foreground", "res/fg.png"));

        let layers = sink.into_layers();
        assert_eq!(layers.background.as_deref(), Some("res/bg.png"));
        assert_eq!(layers.foreground.as_deref(), Some("res/fg.png"));
        assert!(!layers.is_empty());
    }

    #[test]
    fn no_layers() {
        assert!(AdaptiveIconSink::new().into_layers().is_empty());
    }
}
