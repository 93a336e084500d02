//! Arena-based DOM the comparison works on.
//!
//! - **indextree Arena**: all nodes in contiguous memory, addressed by `NodeId`
//! - **Refcounted strings**: tags, attribute values and text are `StrTendril`s
//!   sharing the source buffer
//! - **In-place edits**: markers are spliced into the arena without re-parsing

use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, QualName, parse_document};
use indexmap::IndexMap;
use indextree::{Arena, NodeId};
use std::borrow::Cow;
use std::cell::RefCell;
use tendril::{StrTendril, TendrilSink};

use crate::error::DiffError;

/// A parsed HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    /// All nodes live here
    pub arena: Arena<NodeData>,

    /// Root node (usually `<html>` element)
    pub root: NodeId,

    /// DOCTYPE if present (usually "html")
    pub doctype: Option<StrTendril>,
}

impl Document {
    /// Parse an HTML string (a full document or a body fragment).
    pub fn parse(html: &str) -> Self {
        parse(html)
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Iterate the element children of a node, skipping text and comments.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
            .filter(|&child| self.element(child).is_some())
    }

    /// The parent of a node, if it is still attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    /// Element data of a node, or `None` for non-elements.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.arena.get(id)?.get().kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Mutable element data of a node, or `None` for non-elements.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.arena.get_mut(id)?.get_mut().kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Text of a text node, or `None` for other kinds.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.arena.get(id)?.get().kind {
            NodeKind::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Get the `<body>` element if present
    pub fn body(&self) -> Option<NodeId> {
        self.root
            .children(&self.arena)
            .find(|&id| self.element(id).is_some_and(|elem| elem.tag.as_ref() == "body"))
    }

    /// Concatenated text of every text node below `id`, in document order.
    ///
    /// Comments are not text. A text node on its own yields its own text.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in id.descendants(&self.arena) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Create a detached element.
    pub fn new_element(&mut self, tag: &str, attrs: IndexMap<String, StrTendril>) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Element(ElementData {
                tag: StrTendril::from(tag),
                attrs,
            }),
            ns: Namespace::Html,
        })
    }

    /// Create a detached text node.
    pub fn new_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Text(StrTendril::from(text)),
            ns: Namespace::Html,
        })
    }

    /// Replace `target` by `replacements`, in order, at its position in its parent.
    ///
    /// The replacements must be detached nodes. `target` is detached afterwards.
    pub fn replace_node(&mut self, target: NodeId, replacements: &[NodeId]) -> Result<(), DiffError> {
        if self.parent(target).is_none() {
            return Err(DiffError::Splice {
                reason: "target has no parent".to_string(),
            });
        }
        for &replacement in replacements {
            target
                .checked_insert_before(replacement, &mut self.arena)
                .map_err(|err| DiffError::Splice {
                    reason: err.to_string(),
                })?;
        }
        target.detach(&mut self.arena);
        Ok(())
    }
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is
    pub kind: NodeKind,
    /// Namespace the node was parsed in
    pub ns: Namespace,
}

/// Node types
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content
    Text(StrTendril),
    /// HTML comment
    Comment(StrTendril),
}

/// Element data (tag + attributes)
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name, lowercase for HTML elements
    pub tag: StrTendril,

    /// Attributes in source order. Keys are `String` to avoid clippy's
    /// mutable_key_type on tendrils.
    pub attrs: IndexMap<String, StrTendril>,
}

impl ElementData {
    /// Value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|value| value.as_ref())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(name.to_string(), StrTendril::from(value));
    }

    /// Remove an attribute, preserving the order of the others.
    pub fn remove_attr(&mut self, name: &str) -> Option<StrTendril> {
        self.attrs.shift_remove(name)
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    /// Whether `class` lists `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes().any(|class| class == class_name)
    }

    /// Append a class, keeping the existing ones. No-op if already present.
    pub fn append_class(&mut self, class_name: &str) {
        if self.has_class(class_name) {
            return;
        }
        let joined = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class_name}"),
            _ => class_name.to_string(),
        };
        self.set_attr("class", &joined);
    }
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// `http://www.w3.org/1999/xhtml`
    Html,
    /// `http://www.w3.org/2000/svg`
    Svg,
    /// `http://www.w3.org/1998/Math/MathML`
    MathMl,
}

impl Namespace {
    /// Map a namespace URL; unknown URLs are treated as HTML.
    pub fn from_url(url: &str) -> Self {
        match url {
            "http://www.w3.org/2000/svg" => Namespace::Svg,
            "http://www.w3.org/1998/Math/MathML" => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    /// The namespace URL.
    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// Parse HTML into an arena-based [`Document`].
///
/// html5ever recovers from any markup, so this never fails. A bare fragment
/// ends up inside the implied `<body>`.
pub fn parse(html: &str) -> Document {
    let sink = ArenaSink::new();
    parse_document(sink, Default::default()).one(StrTendril::from(html))
}

/// Owned element name wrapper
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &html5ever::Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink building the arena. RefCells because html5ever only hands out `&self`.
struct ArenaSink {
    arena: RefCell<Arena<NodeData>>,

    /// Document node (parent of `<html>`)
    document: NodeId,

    doctype: RefCell<Option<StrTendril>>,
}

impl ArenaSink {
    fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData {
            kind: NodeKind::Document,
            ns: Namespace::Html,
        });

        ArenaSink {
            arena: RefCell::new(arena),
            document,
            doctype: RefCell::new(None),
        }
    }

    fn new_text_node(arena: &mut Arena<NodeData>, text: StrTendril) -> NodeId {
        arena.new_node(NodeData {
            kind: NodeKind::Text(text),
            ns: Namespace::Html,
        })
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let arena = self.arena.into_inner();

        let root = self
            .document
            .children(&arena)
            .find(|&id| matches!(arena[id].get().kind, NodeKind::Element(_)))
            .unwrap_or(self.document);

        Document {
            arena,
            root,
            doctype: self.doctype.into_inner(),
        }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // html5ever recovers on its own
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        let node = arena[*target].get();

        let (ns, local) = match &node.kind {
            NodeKind::Element(elem) => (node.ns, LocalName::from(elem.tag.as_ref())),
            _ => (Namespace::Html, LocalName::from("")),
        };

        OwnedElemName(QualName {
            prefix: None,
            ns: html5ever::Namespace::from(ns.url()),
            local,
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let tag = StrTendril::from(name.local.as_ref());
        let ns = Namespace::from_url(name.ns.as_ref());

        let attrs: IndexMap<_, _> = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value))
            .collect();

        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Element(ElementData { tag, attrs }),
            ns,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(text),
            ns: Namespace::Html,
        })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(StrTendril::new()),
            ns: Namespace::Html,
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                parent.append(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                // Adjacent text merges into one node, like the browser DOM
                let last_child = parent.children(&arena).next_back();
                if let Some(last_child) = last_child
                    && let NodeKind::Text(existing) = &mut arena[last_child].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = Self::new_text_node(&mut arena, text);
                parent.append(text_node, &mut arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                sibling.insert_before(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                let prev = arena[*sibling].previous_sibling();
                if let Some(prev) = prev
                    && let NodeKind::Text(existing) = &mut arena[prev].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = Self::new_text_node(&mut arena, text);
                sibling.insert_before(text_node, &mut arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        *self.doctype.borrow_mut() = Some(name);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents stay inline; they count as ordinary children
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = &mut arena[*target].get_mut().kind {
            for attr in attrs {
                elem.attrs
                    .entry(attr.name.local.to_string())
                    .or_insert(attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&arena).collect();
        for child in children {
            child.detach(&mut arena);
            new_parent.append(child, &mut arena);
        }
    }
}
