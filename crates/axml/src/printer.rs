use std::fmt::Write;

use crate::sink::XmlSink;
use crate::structs::{EndTag, StartTag};

/// Rebuilds readable XML text from decoder events
///
/// Elements without children are self-closed. A single attribute stays on the
/// tag line, several attributes get one line each.
pub struct XmlPrinter {
    out: String,
    depth: usize,

    /// A start tag was written but not closed yet
    open: bool,

    /// Namespaces declared since the last start tag
    pending_namespaces: Vec<(String, String)>,
}

impl Default for XmlPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlPrinter {
    pub fn new() -> XmlPrinter {
        XmlPrinter {
            out: String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n"),
            depth: 0,
            open: false,
            pending_namespaces: Vec::new(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.out
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn close_pending(&mut self) {
        if self.open {
            self.out.push_str(">\n");
            self.open = false;
        }
    }
}

impl XmlSink for XmlPrinter {
    fn on_start_tag(&mut self, tag: &StartTag) {
        self.close_pending();
        self.indent(self.depth);
        self.out.push('<');
        self.out.push_str(&tag.name);

        let mut attributes: Vec<(String, &str)> = self
            .pending_namespaces
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{}", prefix), uri.as_str()))
            .collect();
        attributes.extend(
            tag.attributes
                .iter()
                .map(|attr| (attr.qualified_name(), attr.value.as_str())),
        );

        let mut text = String::new();
        match attributes.as_slice() {
            [] => {}
            [(name, value)] => {
                let _ = write!(text, " {}=\"{}\"", name, escape(value));
            }
            many => {
                let pad = "  ".repeat(self.depth + 1);
                for (name, value) in many {
                    let _ = write!(text, "\n{}{}=\"{}\"", pad, name, escape(value));
                }
            }
        }

        self.out.push_str(&text);
        self.pending_namespaces.clear();
        self.open = true;
        self.depth += 1;
    }

    fn on_end_tag(&mut self, tag: &EndTag) {
        self.depth = self.depth.saturating_sub(1);

        if self.open {
            self.out.push_str("/>\n");
            self.open = false;
            return;
        }

        self.indent(self.depth);
        let _ = writeln!(self.out, "</{}>", tag.name);
    }

    fn on_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.close_pending();
        self.indent(self.depth);
        self.out.push_str(&escape(text));
        self.out.push('\n');
    }

    fn on_namespace_start(&mut self, prefix: &str, uri: &str) {
        self.pending_namespaces
            .push((prefix.to_owned(), uri.to_owned()));
    }
}

/// Escape markup characters of attribute values and text
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{Attribute, ResourceValue, ValueType};

    fn attr(prefix: Option<&str>, name: &str, value: &str) -> Attribute {
        Attribute {
            namespace: None,
            prefix: prefix.map(str::to_owned),
            name: name.to_owned(),
            value: value.to_owned(),
            typed_value: ResourceValue::new(ValueType::String, 0),
        }
    }

    fn start(name: &str, attributes: Vec<Attribute>) -> StartTag {
        StartTag {
            name: name.to_owned(),
            attributes,
            ..StartTag::default()
        }
    }

    fn end(name: &str) -> EndTag {
        EndTag {
            name: name.to_owned(),
            ..EndTag::default()
        }
    }

    #[test]
    fn prints_nested_document() {
        let mut printer = XmlPrinter::new();

        printer.on_namespace_start("android", "http://schemas.android.com/apk/res/android");
        printer.on_start_tag(&start("manifest", vec![attr(None, "package", "com.example")]));
        printer.on_start_tag(&start(
            "uses-sdk",
            vec![attr(Some("android"), "minSdkVersion", "21")],
        ));
        printer.on_end_tag(&end("uses-sdk"));
        printer.on_start_tag(&start("application", vec![]));
        printer.on_text("a < b");
        printer.on_end_tag(&end("application"));
        printer.on_end_tag(&end("manifest"));
        printer.on_namespace_end("android", "http://schemas.android.com/apk/res/android");

        let expected = "<?xml version=\"1.0\" encoding=\"utf-8\"?>
<manifest
  xmlns:android=\"http://schemas.android.com/apk/res/android\"
  package=\"com.example\">
  <uses-sdk android:minSdkVersion=\"21\"/>
  <application>
    a &lt; b
  </application>
</manifest>
";
        assert_eq!(printer.into_string(), expected);
    }

    #[test]
    fn escapes_values() {
        assert_eq!(escape("\"a\" & <b>"), "&quot;a&quot; &amp; &lt;b&gt;");
    }
}
