use crate::structs::{EndTag, StartTag};

/// Receiver of binary XML events in document order
pub trait XmlSink {
    fn on_start_tag(&mut self, tag: &StartTag);

    fn on_end_tag(&mut self, tag: &EndTag);

    fn on_text(&mut self, _text: &str) {}

    fn on_namespace_start(&mut self, _prefix: &str, _uri: &str) {}

    fn on_namespace_end(&mut self, _prefix: &str, _uri: &str) {}
}

/// Forwards every event to each of its sinks, in insertion order
#[derive(Default)]
pub struct CompositeSink<'a> {
    sinks: Vec<&'a mut dyn XmlSink>,
}

impl<'a> CompositeSink<'a> {
    pub fn new() -> CompositeSink<'a> {
        CompositeSink { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: &'a mut dyn XmlSink) -> CompositeSink<'a> {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: &'a mut dyn XmlSink) {
        self.sinks.push(sink);
    }
}

impl XmlSink for CompositeSink<'_> {
    fn on_start_tag(&mut self, tag: &StartTag) {
        for sink in self.sinks.iter_mut() {
            sink.on_start_tag(tag);
        }
    }

    fn on_end_tag(&mut self, tag: &EndTag) {
        for sink in self.sinks.iter_mut() {
            sink.on_end_tag(tag);
        }
    }

    fn on_text(&mut self, text: &str) {
        for sink in self.sinks.iter_mut() {
            sink.on_text(text);
        }
    }

    fn on_namespace_start(&mut self, prefix: &str, uri: &str) {
        for sink in self.sinks.iter_mut() {
            sink.on_namespace_start(prefix, uri);
        }
    }

    fn on_namespace_end(&mut self, prefix: &str, uri: &str) {
        for sink in self.sinks.iter_mut() {
            sink.on_namespace_end(prefix, uri);
        }
    }
}
