//! Writing change markers into a document.
//!
//! Two kinds of annotation:
//! - **Inline markers**: a changed byte range of the concatenated text is cut
//!   out of its text node(s) and wrapped in a `<span>` carrying a change class
//! - **Node marks**: a whole element gets a change class appended
//!
//! A text node is split at most once per pass. All ranges touching it are
//! gathered first, then one replacement list (before / marker / between /
//! marker / after ...) is spliced in place of the node.

use facet::Facet;
use graft::{AddressPath, Side};
use indexmap::IndexMap;
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;
use tendril::StrTendril;

use crate::dom::Document;
use crate::error::DiffError;
use crate::index::{TextSpan, text_spans};
use crate::words::{DiffOp, Op};
use crate::{debug, trace};

/// Attribute holding a node's inline style from before a node mark rewrote it.
pub const ORIGINAL_STYLE_ATTR: &str = "data-diff-original-style";

/// Tag of inline marker elements.
pub const MARKER_TAG: &str = "span";

/// The annotation vocabulary emitted into output HTML.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeClass {
    /// Inline text only in the old document
    Removed,
    /// Inline text only in the new document
    Added,
    /// Whole element only in the old document
    NodeRemoved,
    /// Whole element only in the new document
    NodeAdded,
    /// Cosmetic run of spaces, content unchanged
    Whitespace,
}

impl ChangeClass {
    /// Every class, in vocabulary order.
    pub const ALL: [ChangeClass; 5] = [
        ChangeClass::Removed,
        ChangeClass::Added,
        ChangeClass::NodeRemoved,
        ChangeClass::NodeAdded,
        ChangeClass::Whitespace,
    ];

    /// The CSS class name.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeClass::Removed => "diff-removed",
            ChangeClass::Added => "diff-added",
            ChangeClass::NodeRemoved => "diff-node-removed",
            ChangeClass::NodeAdded => "diff-node-added",
            ChangeClass::Whitespace => "diff-whitespace",
        }
    }

    /// Parse a CSS class name.
    pub fn from_class(class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == class)
    }

    /// Inline class for changed text on `side`.
    pub fn inline_for(side: Side) -> Self {
        match side {
            Side::Old => ChangeClass::Removed,
            Side::New => ChangeClass::Added,
        }
    }

    /// Node class for an unmatched element on `side`.
    pub fn node_for(side: Side) -> Self {
        match side {
            Side::Old => ChangeClass::NodeRemoved,
            Side::New => ChangeClass::NodeAdded,
        }
    }
}

/// How many markers of each class a pass emitted.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerCounts {
    /// `diff-removed` spans
    pub removed: usize,
    /// `diff-added` spans
    pub added: usize,
    /// `diff-node-removed` elements
    pub node_removed: usize,
    /// `diff-node-added` elements
    pub node_added: usize,
    /// `diff-whitespace` spans
    pub whitespace: usize,
}

impl MarkerCounts {
    fn record(&mut self, class: ChangeClass) {
        match class {
            ChangeClass::Removed => self.removed += 1,
            ChangeClass::Added => self.added += 1,
            ChangeClass::NodeRemoved => self.node_removed += 1,
            ChangeClass::NodeAdded => self.node_added += 1,
            ChangeClass::Whitespace => self.whitespace += 1,
        }
    }

    /// Sum over all classes.
    pub fn total(&self) -> usize {
        self.removed + self.added + self.node_removed + self.node_added + self.whitespace
    }

    /// Add another side's counts.
    pub fn merge(&mut self, other: &MarkerCounts) {
        self.removed += other.removed;
        self.added += other.added;
        self.node_removed += other.node_removed;
        self.node_added += other.node_added;
        self.whitespace += other.whitespace;
    }
}

/// A maximal run of same-classification fragments in one side's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordGroup {
    /// Whether the run is a deletion (old view) or insertion (new view)
    pub changed: bool,
    /// Byte offset of the first fragment
    pub start: usize,
    /// Byte offset one past the last fragment
    pub end: usize,
}

/// Fold one side's view of `ops` into word groups.
///
/// The old view keeps equal and delete fragments, the new view keeps equal
/// and insert fragments. Offsets are relative to the text that view
/// reconstructs.
pub fn word_groups(ops: &[DiffOp], side: Side) -> Vec<WordGroup> {
    let hidden = match side {
        Side::Old => Op::Insert,
        Side::New => Op::Delete,
    };

    let mut groups: Vec<WordGroup> = Vec::new();
    let mut offset = 0;
    for op in ops.iter().filter(|op| op.op != hidden) {
        let changed = op.is_change();
        let end = offset + op.text.len();
        match groups.last_mut() {
            Some(last) if last.changed == changed => last.end = end,
            _ => groups.push(WordGroup {
                changed,
                start: offset,
                end,
            }),
        }
        offset = end;
    }
    groups
}

/// Annotates one document for the duration of a pass.
///
/// Tracks which text nodes were already split (so none is split twice) and
/// counts emitted markers.
pub struct Annotator<'d> {
    doc: &'d mut Document,
    side: Side,
    processed: HashSet<NodeId>,
    counts: MarkerCounts,
}

impl<'d> Annotator<'d> {
    /// Start annotating `doc`, which holds the `side` version.
    pub fn new(doc: &'d mut Document, side: Side) -> Self {
        Self {
            doc,
            side,
            processed: HashSet::default(),
            counts: MarkerCounts::default(),
        }
    }

    /// The document being annotated.
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    /// Which side the document is.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Markers emitted so far.
    pub fn counts(&self) -> MarkerCounts {
        self.counts
    }

    /// Wrap the changed word groups of this side's view of `ops`.
    ///
    /// `root`'s text must be the text this side's view reconstructs. With
    /// `skip_whitespace`, intersections that are whitespace only are left
    /// alone.
    pub fn highlight_ops(
        &mut self,
        root: NodeId,
        ops: &[DiffOp],
        skip_whitespace: bool,
    ) -> Result<usize, DiffError> {
        let ranges: Vec<(usize, usize)> = word_groups(ops, self.side)
            .into_iter()
            .filter(|group| group.changed)
            .map(|group| (group.start, group.end))
            .collect();
        self.wrap_ranges(root, &ranges, ChangeClass::inline_for(self.side), skip_whitespace)
    }

    /// Wrap every run of at least `min_run` literal spaces below `root`.
    ///
    /// Characters are neither added nor removed.
    pub fn highlight_whitespace_runs(&mut self, root: NodeId, min_run: usize) -> Result<usize, DiffError> {
        let text = self.doc.text_content(root);
        let min_run = min_run.max(1);

        let mut ranges = Vec::new();
        let mut run_start = None;
        for (idx, byte) in text.bytes().enumerate() {
            match (byte == b' ', run_start) {
                (true, None) => run_start = Some(idx),
                (false, Some(start)) => {
                    if idx - start >= min_run {
                        ranges.push((start, idx));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start
            && text.len() - start >= min_run
        {
            ranges.push((start, text.len()));
        }

        trace!(runs = ranges.len(), "whitespace runs");
        self.wrap_ranges(root, &ranges, ChangeClass::Whitespace, false)
    }

    /// Wrap byte ranges of `root`'s concatenated text in markers of `class`.
    ///
    /// `ranges` must be sorted and disjoint. Returns the number of markers.
    pub fn wrap_ranges(
        &mut self,
        root: NodeId,
        ranges: &[(usize, usize)],
        class: ChangeClass,
        skip_whitespace: bool,
    ) -> Result<usize, DiffError> {
        if ranges.is_empty() {
            return Ok(0);
        }

        let mut emitted = 0;
        for span in text_spans(&*self.doc, root) {
            if self.processed.contains(&span.node) {
                trace!(?span.node, "text node already split");
                continue;
            }
            let Some(text) = self.doc.text(span.node).map(str::to_string) else {
                continue;
            };

            let local = local_ranges(&span, ranges, &text, skip_whitespace)?;
            if local.is_empty() {
                continue;
            }
            emitted += self.split_text_node(span.node, &text, &local, class)?;
        }
        Ok(emitted)
    }

    fn split_text_node(
        &mut self,
        node: NodeId,
        text: &str,
        local: &[(usize, usize)],
        class: ChangeClass,
    ) -> Result<usize, DiffError> {
        let parent = self.doc.parent(node);
        let mut replacements = Vec::with_capacity(local.len() * 2 + 1);
        let mut cursor = 0;
        for &(start, end) in local {
            if start > cursor {
                replacements.push(self.doc.new_text(&text[cursor..start]));
            }
            replacements.push(self.new_marker(parent, class, &text[start..end])?);
            cursor = end;
        }
        if cursor < text.len() {
            replacements.push(self.doc.new_text(&text[cursor..]));
        }

        self.doc.replace_node(node, &replacements)?;

        self.processed.insert(node);
        for &replacement in &replacements {
            self.processed.extend(replacement.descendants(&self.doc.arena));
        }
        for _ in local {
            self.counts.record(class);
        }
        trace!(pieces = replacements.len(), markers = local.len(), "split text node");
        Ok(local.len())
    }

    /// A detached `<span>` around `text`, dressed like `parent`.
    fn new_marker(&mut self, parent: Option<NodeId>, class: ChangeClass, text: &str) -> Result<NodeId, DiffError> {
        let mut attrs: IndexMap<String, StrTendril> = IndexMap::new();
        let parent_elem = parent.and_then(|id| self.doc.element(id));

        let mut classes: Vec<&str> = parent_elem
            .map(|elem| elem.classes().filter(|c| !c.starts_with("diff-")).collect())
            .unwrap_or_default();
        classes.push(class.as_str());
        attrs.insert("class".to_string(), StrTendril::from(classes.join(" ").as_str()));

        if let Some(style) = parent_elem.and_then(|elem| elem.attr("style"))
            && !style.trim().is_empty()
        {
            attrs.insert("style".to_string(), StrTendril::from(style));
        }

        let marker = self.doc.new_element(MARKER_TAG, attrs);
        let inner = self.doc.new_text(text);
        marker
            .checked_append(inner, &mut self.doc.arena)
            .map_err(|err| DiffError::Splice {
                reason: err.to_string(),
            })?;
        Ok(marker)
    }

    /// Mark a whole element as removed or added.
    ///
    /// The class is appended to the existing ones. If the inline style sets a
    /// background, the original style is kept in [`ORIGINAL_STYLE_ATTR`] and
    /// the background declarations are dropped so the mark shows.
    pub fn mark_node(&mut self, id: NodeId, class: ChangeClass) {
        let Some(elem) = self.doc.element_mut(id) else {
            return;
        };

        elem.append_class(class.as_str());

        if let Some(style) = elem.attr("style").map(str::to_string)
            && style.to_ascii_lowercase().contains("background")
        {
            elem.set_attr(ORIGINAL_STYLE_ATTR, &style);
            let kept = strip_background(&style);
            if kept.is_empty() {
                elem.remove_attr("style");
            } else {
                elem.set_attr("style", &kept);
            }
        }

        self.counts.record(class);
    }

    /// Path of the first element below `root` that carries a change class.
    pub fn first_marker(&self, root: NodeId) -> Option<AddressPath> {
        first_marker(&*self.doc, root, self.side)
    }
}

/// Apply one word diff to a changed pair, both sides at once.
///
/// Whitespace-only intersections are skipped on both sides.
pub fn apply_highlights(
    old: &mut Annotator<'_>,
    old_element: NodeId,
    new: &mut Annotator<'_>,
    new_element: NodeId,
    ops: &[DiffOp],
) -> Result<(), DiffError> {
    let removed = old.highlight_ops(old_element, ops, true)?;
    let added = new.highlight_ops(new_element, ops, true)?;
    debug!(removed, added, "highlighted pair");
    Ok(())
}

/// Clip `ranges` to `span`, in node-local offsets.
fn local_ranges(
    span: &TextSpan,
    ranges: &[(usize, usize)],
    text: &str,
    skip_whitespace: bool,
) -> Result<Vec<(usize, usize)>, DiffError> {
    let mut local = Vec::new();
    for &(start, end) in ranges {
        if end <= span.start {
            continue;
        }
        if start >= span.end {
            break;
        }
        let Some((from, to)) = span.local_range(start, end) else {
            continue;
        };
        if !text.is_char_boundary(from) || !text.is_char_boundary(to) {
            return Err(DiffError::Splice {
                reason: format!("range {start}..{end} splits a character"),
            });
        }
        if skip_whitespace && text[from..to].chars().all(char::is_whitespace) {
            continue;
        }
        local.push((from, to));
    }
    Ok(local)
}

/// Drop `background*` declarations from an inline style.
fn strip_background(style: &str) -> String {
    style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| !decl.to_ascii_lowercase().starts_with("background"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether `class` belongs to the annotation vocabulary.
pub fn is_change_class(class: &str) -> bool {
    ChangeClass::from_class(class).is_some()
}

/// Path of the first element below `root`, in document order, that carries a
/// change class.
pub fn first_marker(doc: &Document, root: NodeId, side: Side) -> Option<AddressPath> {
    let marked = root.descendants(&doc.arena).skip(1).find(|&id| {
        doc.element(id)
            .is_some_and(|elem| elem.classes().any(is_change_class))
    })?;

    let mut segments = Vec::new();
    let mut current = marked;
    while current != root {
        let parent = doc.parent(current)?;
        let idx = doc.element_children(parent).position(|id| id == current)?;
        segments.push(idx as u32);
        current = parent;
    }
    segments.reverse();
    Some(AddressPath::from_segments(side, &segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;
    use facet_testhelpers::test;

    fn body_of(doc: &Document) -> NodeId {
        doc.body().unwrap()
    }

    #[test]
    fn groups_follow_each_view() {
        let ops = vec![
            DiffOp::new(Op::Equal, "Hello "),
            DiffOp::new(Op::Delete, "world"),
            DiffOp::new(Op::Insert, "there"),
            DiffOp::new(Op::Equal, "!"),
        ];
        assert_eq!(
            word_groups(&ops, Side::Old),
            vec![
                WordGroup { changed: false, start: 0, end: 6 },
                WordGroup { changed: true, start: 6, end: 11 },
                WordGroup { changed: false, start: 11, end: 12 },
            ]
        );
        assert_eq!(word_groups(&ops, Side::New)[1], WordGroup {
            changed: true,
            start: 6,
            end: 11
        });
    }

    #[test]
    fn adjacent_changes_form_one_group() {
        let ops = vec![
            DiffOp::new(Op::Delete, "a"),
            DiffOp::new(Op::Delete, " "),
            DiffOp::new(Op::Delete, "b"),
            DiffOp::new(Op::Equal, "c"),
        ];
        let groups = word_groups(&ops, Side::Old);
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].start, groups[0].end), (0, 3));
    }

    #[test]
    fn marker_copies_parent_dressing() {
        let mut doc = parse(r#"<p><b class="x diff-node-added" style="color: red">Hello world</b></p>"#);
        let body = body_of(&doc);
        let mut annotator = Annotator::new(&mut doc, Side::Old);

        let n = annotator
            .wrap_ranges(body, &[(6, 11)], ChangeClass::Removed, true)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(annotator.counts().removed, 1);
        assert_eq!(
            doc.to_html(),
            r#"<p><b class="x diff-node-added" style="color: red">Hello <span class="x diff-removed" style="color: red">world</span></b></p>"#
        );
    }

    #[test]
    fn range_across_text_nodes_is_split_per_node() {
        let mut doc = parse("<p>one <i>two</i> three</p>");
        let body = body_of(&doc);
        let mut annotator = Annotator::new(&mut doc, Side::New);

        // "one two three": wrap "e two t"
        let n = annotator
            .wrap_ranges(body, &[(2, 9)], ChangeClass::Added, false)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            doc.to_html(),
            "<p>on<span class=\"diff-added\">e </span><i><span class=\"diff-added\">two</span></i><span class=\"diff-added\"> t</span>hree</p>"
        );
    }

    #[test]
    fn several_ranges_split_a_node_once() {
        let mut doc = parse("<p>a b c d</p>");
        let body = body_of(&doc);
        let mut annotator = Annotator::new(&mut doc, Side::Old);

        annotator
            .wrap_ranges(body, &[(0, 1), (4, 5)], ChangeClass::Removed, true)
            .unwrap();
        // Second pass over the same tree finds nothing left to split
        let again = annotator
            .wrap_ranges(body, &[(2, 3)], ChangeClass::Removed, true)
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(
            doc.to_html(),
            "<p><span class=\"diff-removed\">a</span> b <span class=\"diff-removed\">c</span> d</p>"
        );
    }

    #[test]
    fn whitespace_only_intersections_are_skipped() {
        let mut doc = parse("<p>a<b> </b>c</p>");
        let body = body_of(&doc);
        let mut annotator = Annotator::new(&mut doc, Side::Old);

        let n = annotator
            .wrap_ranges(body, &[(0, 3)], ChangeClass::Removed, true)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            doc.to_html(),
            "<p><span class=\"diff-removed\">a</span><b> </b><span class=\"diff-removed\">c</span></p>"
        );
    }

    #[test]
    fn whitespace_runs_are_wrapped_without_changing_text() {
        let mut doc = parse("<p>a  b c   d</p>");
        let body = body_of(&doc);
        let before = doc.text_content(body);
        let mut annotator = Annotator::new(&mut doc, Side::New);

        let n = annotator.highlight_whitespace_runs(body, 2).unwrap();
        assert_eq!(n, 2);
        assert_eq!(annotator.counts().whitespace, 2);
        assert_eq!(doc.text_content(body), before);
        assert_eq!(
            doc.to_html(),
            "<p>a<span class=\"diff-whitespace\">  </span>b c<span class=\"diff-whitespace\">   </span>d</p>"
        );
    }

    #[test]
    fn node_mark_appends_class_and_saves_background() {
        let mut doc = parse(
            r#"<p class="lead" style="color: red; background-color: yellow">x</p><p>y</p>"#,
        );
        let body = body_of(&doc);
        let ps: Vec<_> = doc.element_children(body).collect();
        let mut annotator = Annotator::new(&mut doc, Side::Old);

        annotator.mark_node(ps[0], ChangeClass::NodeRemoved);
        annotator.mark_node(ps[1], ChangeClass::NodeRemoved);
        assert_eq!(annotator.counts().node_removed, 2);

        let first = doc.element(ps[0]).unwrap();
        assert_eq!(first.attr("class"), Some("lead diff-node-removed"));
        assert_eq!(first.attr("style"), Some("color: red"));
        assert_eq!(
            first.attr(ORIGINAL_STYLE_ATTR),
            Some("color: red; background-color: yellow")
        );
        let second = doc.element(ps[1]).unwrap();
        assert_eq!(second.attr("class"), Some("diff-node-removed"));
        assert_eq!(second.attr(ORIGINAL_STYLE_ATTR), None);
    }

    #[test]
    fn first_marker_reports_element_path() {
        let mut doc = parse("<p>x</p><div><p>y</p><p>a b</p></div>");
        let body = body_of(&doc);
        let mut annotator = Annotator::new(&mut doc, Side::New);
        assert_eq!(annotator.first_marker(body), None);

        // "xya b": wrap the "b"
        annotator
            .wrap_ranges(body, &[(4, 5)], ChangeClass::Added, true)
            .unwrap();
        let path = annotator.first_marker(body).unwrap();
        assert_eq!(path.to_string(), "new/1/1/0");
    }
}
