//! HTML5 serializer for the arena DOM.
//!
//! Follows the HTML5 serialization rules the comparison output relies on:
//!
//! - Void elements never get end tags
//! - Text content is escaped, except inside raw text elements (script, style)
//! - RCDATA elements (title, textarea) escape only `&` and `<`
//! - Attribute values are escaped and double-quoted
//! - Foreign content (SVG/MathML) without children uses self-closing syntax

use indextree::NodeId;
use std::fmt::Write;

use crate::dom::{Document, ElementData, Namespace, NodeKind};

/// Options for HTML serialization.
#[derive(Clone, Debug)]
pub struct SerializeOptions {
    /// Whether to sort attributes alphabetically (default: false, source order).
    /// Enable this for deterministic output across attribute rewrites.
    pub sort_attributes: bool,
    /// Whether to escape `</script` sequences in script content (default: true for safety)
    pub escape_script_end_tags: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            sort_attributes: false,
            escape_script_end_tags: true,
        }
    }
}

impl SerializeOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable sorting attributes alphabetically for deterministic output.
    pub fn sort_attributes(mut self) -> Self {
        self.sort_attributes = true;
        self
    }

    /// Disable escaping `</script` in script content (not recommended).
    pub fn no_escape_script_end_tags(mut self) -> Self {
        self.escape_script_end_tags = false;
        self
    }
}

/// Serialize the children of `parent` (the node itself is not emitted).
pub fn serialize_children(doc: &Document, parent: NodeId, opts: &SerializeOptions) -> String {
    let mut out = String::new();
    let mut ser = Serializer::new(&mut out, doc, opts);
    for child in doc.children(parent) {
        ser.write_node(child);
    }
    out
}

/// Serialize a node and its subtree.
pub fn serialize_node(doc: &Document, node: NodeId, opts: &SerializeOptions) -> String {
    let mut out = String::new();
    Serializer::new(&mut out, doc, opts).write_node(node);
    out
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

const RCDATA_ELEMENTS: &[&str] = &["title", "textarea"];

fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_rcdata_element(tag: &str) -> bool {
    RCDATA_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

struct Serializer<'a, W: Write> {
    out: &'a mut W,
    doc: &'a Document,
    options: &'a SerializeOptions,
}

impl<'a, W: Write> Serializer<'a, W> {
    fn new(out: &'a mut W, doc: &'a Document, options: &'a SerializeOptions) -> Self {
        Self { out, doc, options }
    }

    fn write_text_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                '\u{a0}' => self.out.write_str("&nbsp;"),
                _ => self.out.write_char(c),
            };
        }
    }

    /// Escape text content for RCDATA elements (only & and <).
    fn write_rcdata_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                _ => self.out.write_char(c),
            };
        }
    }

    /// Write raw text content, optionally escaping script end tags.
    fn write_raw_text(&mut self, text: &str, tag: &str) {
        if !(self.options.escape_script_end_tags && tag.eq_ignore_ascii_case("script")) {
            let _ = self.out.write_str(text);
            return;
        }

        // ASCII case-insensitive matching on bytes keeps indices aligned with `text`
        const PATTERN: &[u8] = b"</script";
        let bytes = text.as_bytes();
        let mut last_end = 0;
        let mut i = 0;
        while i + PATTERN.len() <= bytes.len() {
            if bytes[i..i + PATTERN.len()].eq_ignore_ascii_case(PATTERN) {
                let _ = self.out.write_str(&text[last_end..i]);
                let _ = self.out.write_str("<\\/script");
                i += PATTERN.len();
                last_end = i;
            } else {
                i += 1;
            }
        }
        let _ = self.out.write_str(&text[last_end..]);
    }

    fn write_attr_value_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                '"' => self.out.write_str("&quot;"),
                '\u{a0}' => self.out.write_str("&nbsp;"),
                _ => self.out.write_char(c),
            };
        }
    }

    fn write_attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.out, " {name}=\"");
        self.write_attr_value_escaped(value);
        let _ = self.out.write_char('"');
    }

    fn write_node(&mut self, id: NodeId) {
        let doc = self.doc;
        match &doc.get(id).kind {
            NodeKind::Document => {
                for child in doc.children(id) {
                    self.write_node(child);
                }
            }
            NodeKind::Element(elem) => self.write_element(id, elem),
            NodeKind::Text(text) => self.write_text_escaped(text),
            NodeKind::Comment(text) => {
                // `--` would close the comment early
                let safe_text = text.replace("--", "- -");
                let _ = write!(self.out, "<!--{safe_text}-->");
            }
        }
    }

    fn write_element(&mut self, id: NodeId, elem: &ElementData) {
        let doc = self.doc;
        let tag = elem.tag.as_ref();

        let _ = write!(self.out, "<{tag}");
        if self.options.sort_attributes {
            let mut attrs: Vec<_> = elem.attrs.iter().collect();
            attrs.sort_by_key(|(k, _)| *k);
            for (name, value) in attrs {
                self.write_attr(name, value);
            }
        } else {
            for (name, value) in &elem.attrs {
                self.write_attr(name, value);
            }
        }

        if is_void_element(tag) {
            let _ = self.out.write_char('>');
            return;
        }

        let mut children = doc.children(id).peekable();
        if doc.get(id).ns != Namespace::Html && children.peek().is_none() {
            let _ = self.out.write_str("/>");
            return;
        }

        let _ = self.out.write_char('>');

        let is_raw = is_raw_text_element(tag);
        let is_rcdata = is_rcdata_element(tag);
        for child in children {
            match doc.text(child) {
                Some(text) if is_raw => self.write_raw_text(text, tag),
                Some(text) if is_rcdata => self.write_rcdata_escaped(text),
                _ => self.write_node(child),
            }
        }

        let _ = write!(self.out, "</{tag}>");
    }
}

impl Document {
    /// Serialize the body's children with default options.
    pub fn to_html(&self) -> String {
        self.to_html_with_options(&SerializeOptions::default())
    }

    /// Serialize the body's children with custom options.
    ///
    /// Returns an empty string for a document without a body.
    pub fn to_html_with_options(&self, opts: &SerializeOptions) -> String {
        match self.body() {
            Some(body) => serialize_children(self, body, opts),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;
    use facet_testhelpers::test;

    #[test]
    fn test_body_fragment() {
        let doc = parse("<html><body><div>Hello</div></body></html>");
        assert_eq!(doc.to_html(), "<div>Hello</div>");
    }

    #[test]
    fn test_void_elements() {
        let doc = parse("<p>a<br>b<img src=\"x.png\"></p>");
        let html = doc.to_html();
        assert_eq!(html, "<p>a<br>b<img src=\"x.png\"></p>");
    }

    #[test]
    fn test_text_escaping() {
        let doc = parse("<div>&lt;script&gt; &amp; \"quotes\"</div>");
        assert_eq!(doc.to_html(), "<div>&lt;script&gt; &amp; \"quotes\"</div>");
    }

    #[test]
    fn test_nbsp_survives() {
        let doc = parse("<p>a&nbsp;b</p>");
        assert_eq!(doc.to_html(), "<p>a&nbsp;b</p>");
    }

    #[test]
    fn test_attribute_escaping() {
        let doc = parse(r#"<a href="test?a=1&amp;b=2" title="Say &quot;hi&quot;">x</a>"#);
        let html = doc.to_html();
        assert!(html.contains("href=\"test?a=1&amp;b=2\""));
        assert!(html.contains("title=\"Say &quot;hi&quot;\""));
    }

    #[test]
    fn test_script_end_tag_escaping() {
        let mut doc = parse("<p>x</p><script></script>");
        let body = doc.body().unwrap();
        let script = doc.element_children(body).nth(1).unwrap();
        let text = doc.new_text("var x = '</SCRIPT>';");
        script.append(text, &mut doc.arena);

        let html = doc.to_html();
        assert!(html.contains("<\\/script"));

        let raw = doc.to_html_with_options(&SerializeOptions::new().no_escape_script_end_tags());
        assert!(raw.contains("'</SCRIPT>'"));
    }

    #[test]
    fn test_rcdata_elements() {
        let doc = parse("<textarea>Test &amp; &lt;Demo></textarea>");
        assert_eq!(doc.to_html(), "<textarea>Test &amp; &lt;Demo></textarea>");
    }

    #[test]
    fn test_comment_with_dashes() {
        let doc = parse("<div><!--Test -- comment--></div>");
        assert_eq!(doc.to_html(), "<div><!--Test - - comment--></div>");
    }

    #[test]
    fn test_foreign_content_self_closing() {
        let doc = parse("<svg><rect></rect></svg>");
        assert_eq!(doc.to_html(), "<svg><rect/></svg>");
    }

    #[test]
    fn test_single_node_with_subtree() {
        let doc = parse(r#"<p>a</p><ul class="x"><li>one &amp; two</li><li><br></li></ul>"#);
        let body = doc.body().unwrap();
        let ul = doc.element_children(body).nth(1).unwrap();
        let opts = SerializeOptions::default();
        assert_eq!(
            serialize_node(&doc, ul, &opts),
            r#"<ul class="x"><li>one &amp; two</li><li><br></li></ul>"#
        );
        let li = doc.element_children(ul).next().unwrap();
        let text = doc.children(li).next().unwrap();
        assert_eq!(serialize_node(&doc, text, &opts), "one &amp; two");
    }

    #[test]
    fn test_sorted_attributes() {
        let doc = parse(r#"<div zebra="1" alpha="2" mike="3"></div>"#);
        let html = doc.to_html_with_options(&SerializeOptions::default().sort_attributes());
        assert_eq!(html, r#"<div alpha="2" mike="3" zebra="1"></div>"#);
    }
}
