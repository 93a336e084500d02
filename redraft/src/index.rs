//! Tree indexing: path-addressed element records and text-node spans.
//!
//! Two independent walks run over the same subtree. The structural walk visits
//! element children only and numbers them among their element siblings. The
//! text walk visits every descendant text node in document order and records
//! its byte range within the concatenated text.

use graft::{AddressPath, AlignTree, Side};
use indexmap::IndexMap;
use indextree::NodeId;
use std::fmt::Write;

use crate::dom::Document;
use crate::error::DiffError;
use crate::options::DiffOptions;
use crate::trace;

/// One indexed element.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Element-children path from the indexed root
    pub path: AddressPath,
    /// Structural signature, see [`signature`]
    pub signature: String,
    /// Full text content of the subtree
    pub text: String,
    /// Depth below the root; the root's children are at 0
    pub depth: usize,
    /// Arena handle, checked against the path on resolution
    pub node: NodeId,
}

/// Flat path → record map, in pre-order.
///
/// Ancestor lookups go through [`AddressPath::parent`] and the map; records
/// hold no references to each other.
#[derive(Debug, Clone)]
pub struct NodeIndex {
    side: Side,
    root: NodeId,
    records: IndexMap<AddressPath, NodeRecord>,
}

impl NodeIndex {
    /// Index every element below `root` (the root itself is not indexed).
    pub fn build(doc: &Document, root: NodeId, side: Side, opts: &DiffOptions) -> Self {
        let mut index = Self {
            side,
            root,
            records: IndexMap::new(),
        };
        index.visit(doc, root, &AddressPath::root(side), opts);
        trace!(%side, records = index.records.len(), "indexed");
        index
    }

    fn visit(&mut self, doc: &Document, parent: NodeId, parent_path: &AddressPath, opts: &DiffOptions) {
        for (idx, child) in doc.element_children(parent).enumerate() {
            let path = parent_path.child(idx as u32);
            let record = NodeRecord {
                depth: path.depth(),
                signature: signature(doc, child, opts),
                text: doc.text_content(child),
                node: child,
                path: path.clone(),
            };
            self.records.insert(path.clone(), record);
            self.visit(doc, child, &path, opts);
        }
    }

    /// Which side this index covers.
    pub fn side(&self) -> Side {
        self.side
    }

    /// The indexed root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Record at pre-order position `idx`.
    pub fn record(&self, idx: usize) -> Option<&NodeRecord> {
        self.records.get_index(idx).map(|(_, record)| record)
    }

    /// Record addressed by `path`.
    pub fn get(&self, path: &AddressPath) -> Option<&NodeRecord> {
        self.records.get(path)
    }

    /// All records in pre-order.
    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.values()
    }

    /// Re-locate the element of record `idx` by walking its path.
    ///
    /// Fails with [`DiffError::UnresolvableNode`] if the path no longer leads
    /// to the element that was indexed there.
    pub fn resolve(&self, doc: &Document, idx: usize) -> Result<NodeId, DiffError> {
        let record = self.record(idx).ok_or_else(|| DiffError::UnresolvableNode {
            path: format!("{}/#{idx}", self.side),
        })?;
        match resolve(doc, self.root, &record.path) {
            Some(found) if found == record.node => Ok(found),
            _ => Err(DiffError::UnresolvableNode {
                path: record.path.to_string(),
            }),
        }
    }
}

impl AlignTree for NodeIndex {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn depth(&self, idx: usize) -> usize {
        self.records[idx].depth
    }

    fn parent(&self, idx: usize) -> Option<usize> {
        let (path, _) = self.records.get_index(idx)?;
        self.records.get_index_of(&path.parent()?)
    }

    fn signature(&self, idx: usize) -> &str {
        &self.records[idx].signature
    }

    fn content(&self, idx: usize) -> &str {
        &self.records[idx].text
    }
}

/// Walk element children from `root` along `path`.
pub fn resolve(doc: &Document, root: NodeId, path: &AddressPath) -> Option<NodeId> {
    let mut current = root;
    for &segment in path.segments() {
        current = doc.element_children(current).nth(segment as usize)?;
    }
    Some(current)
}

/// Structural fingerprint of an element: `tag[attrs]:count`.
///
/// The tag is lowercased, attributes in the editor's private namespace are
/// dropped, the rest are sorted by name and rendered `name="value"` separated
/// by single spaces. The count is the number of element children. An element
/// without attributes renders as `tag:count`.
pub fn signature(doc: &Document, id: NodeId, opts: &DiffOptions) -> String {
    let Some(elem) = doc.element(id) else {
        return String::new();
    };

    let mut attrs: Vec<(String, &str)> = elem
        .attrs
        .iter()
        .filter(|(name, _)| !opts.is_private_attr(name))
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_ref()))
        .collect();
    attrs.sort();

    let mut out = elem.tag.to_ascii_lowercase();
    if !attrs.is_empty() {
        out.push('[');
        for (i, (name, value)) in attrs.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{name}=\"{value}\"");
        }
        out.push(']');
    }
    let _ = write!(out, ":{}", doc.element_children(id).count());
    out
}

/// A text node's byte range within the concatenated text of an indexed root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    /// The text node
    pub node: NodeId,
    /// Offset of the node's first byte
    pub start: usize,
    /// Offset one past the node's last byte
    pub end: usize,
}

impl TextSpan {
    /// Byte length of the node's text.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the node is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The part of `[start, end)` inside this span, in node-local offsets.
    pub fn local_range(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let from = start.max(self.start);
        let to = end.min(self.end);
        (from < to).then(|| (from - self.start, to - self.start))
    }
}

/// Spans of every text node below `root`, in document order.
///
/// Spans are contiguous: each starts where the previous ended, and the last
/// ends at the length of [`Document::text_content`]. Empty text nodes are
/// skipped.
pub fn text_spans(doc: &Document, root: NodeId) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for node in root.descendants(&doc.arena) {
        if let Some(text) = doc.text(node) {
            if text.is_empty() {
                continue;
            }
            spans.push(TextSpan {
                node,
                start: offset,
                end: offset + text.len(),
            });
            offset += text.len();
        }
    }
    spans
}

/// Index `root`: element records plus the text span layout.
pub fn index(doc: &Document, root: NodeId, side: Side, opts: &DiffOptions) -> (NodeIndex, Vec<TextSpan>) {
    (NodeIndex::build(doc, root, side, opts), text_spans(doc, root))
}
