//! Structural alignment of two HTML trees.
//!
//! Binds [`graft::align`] to [`NodeIndex`] records. The structural-pass judge
//! is the word diff: a pair whose texts differ only in whitespace stays
//! undecided, anything else is a changed pair and gets inline highlights.
//! Residual nodes get whole-node marks.

use graft::{AddressPath, AlignTree, Classification, PairKind, Side, Verdict, align};

use crate::error::DiffError;
use crate::highlight::{Annotator, ChangeClass, apply_highlights};
use crate::index::NodeIndex;
use crate::options::DiffOptions;
use crate::words::{DiffOp, diff_words, has_significant_change};
use crate::{debug, trace};
use indextree::NodeId;

/// What the aligner decided, addressed by paths.
#[derive(Debug, Clone, Default)]
pub struct AlignReport {
    /// Every pair `(old, new)`, in the order it was formed
    pub pairs: Vec<(AddressPath, AddressPath, PairKind)>,
    /// Old elements with no counterpart
    pub removed: Vec<AddressPath>,
    /// New elements with no counterpart
    pub added: Vec<AddressPath>,
    /// Classification of every old element, in pre-order
    pub old_classes: Vec<(AddressPath, Classification)>,
    /// Classification of every new element, in pre-order
    pub new_classes: Vec<(AddressPath, Classification)>,
    /// Changed pairs or residual nodes skipped because they no longer resolved
    pub skipped: usize,
}

impl AlignReport {
    /// Classification of the element at `path`, on either side.
    pub fn classification(&self, path: &AddressPath) -> Option<Classification> {
        let classes = match path.side() {
            Side::Old => &self.old_classes,
            Side::New => &self.new_classes,
        };
        classes
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, class)| *class)
    }
}

/// Align the element children of `old_root` and `new_root` and annotate both
/// trees.
///
/// Changed pairs get inline markers, removed and added elements get node
/// marks. Word-diff and splice failures abort the alignment; elements that
/// no longer resolve are skipped.
pub fn align_documents(
    old: &mut Annotator<'_>,
    old_root: NodeId,
    new: &mut Annotator<'_>,
    new_root: NodeId,
    opts: &DiffOptions,
) -> Result<AlignReport, DiffError> {
    let old_index = NodeIndex::build(old.doc(), old_root, Side::Old, opts);
    let new_index = NodeIndex::build(new.doc(), new_root, Side::New, opts);

    let mut changed: Vec<(usize, usize, Vec<DiffOp>)> = Vec::new();
    let alignment = align(&old_index, &new_index, |a: usize, b: usize| -> Result<Verdict, DiffError> {
        let ops = diff_words(old_index.content(a), new_index.content(b))?;
        if has_significant_change(&ops) {
            trace!(old = a, new = b, "structural pair changed");
            changed.push((a, b, ops));
            Ok(Verdict::Changed)
        } else {
            trace!(old = a, new = b, "structural pair differs in whitespace only");
            Ok(Verdict::WhitespaceOnly)
        }
    })?;

    let mut report = AlignReport::default();

    for (a, b, ops) in &changed {
        let (old_node, new_node) = match (old_index.resolve(old.doc(), *a), new_index.resolve(new.doc(), *b)) {
            (Ok(old_node), Ok(new_node)) => (old_node, new_node),
            (Err(DiffError::UnresolvableNode { path: _path }), _)
            | (_, Err(DiffError::UnresolvableNode { path: _path })) => {
                debug!(path = %_path, "skipping changed pair");
                report.skipped += 1;
                continue;
            }
            (Err(err), _) | (_, Err(err)) => return Err(err),
        };
        apply_highlights(old, old_node, new, new_node, ops)?;
    }

    report.skipped += mark_residuals(old, &old_index, alignment.removed())?;
    report.skipped += mark_residuals(new, &new_index, alignment.added())?;

    for pair in alignment.pairs() {
        if let (Some(a), Some(b)) = (old_index.record(pair.old), new_index.record(pair.new)) {
            report.pairs.push((a.path.clone(), b.path.clone(), pair.kind));
        }
    }
    report.removed = paths(&old_index, alignment.removed());
    report.added = paths(&new_index, alignment.added());
    report.old_classes = old_index
        .records()
        .enumerate()
        .map(|(idx, record)| (record.path.clone(), alignment.old_class(idx)))
        .collect();
    report.new_classes = new_index
        .records()
        .enumerate()
        .map(|(idx, record)| (record.path.clone(), alignment.new_class(idx)))
        .collect();

    debug!(
        pairs = report.pairs.len(),
        changed = changed.len(),
        removed = report.removed.len(),
        added = report.added.len(),
        skipped = report.skipped,
        "alignment applied"
    );
    Ok(report)
}

/// Node-mark every residual record. Returns how many were skipped.
fn mark_residuals(
    annotator: &mut Annotator<'_>,
    index: &NodeIndex,
    residuals: impl Iterator<Item = usize>,
) -> Result<usize, DiffError> {
    let class = ChangeClass::node_for(index.side());
    let mut skipped = 0;
    for idx in residuals {
        match index.resolve(annotator.doc(), idx) {
            Ok(node) => annotator.mark_node(node, class),
            Err(DiffError::UnresolvableNode { path: _path }) => {
                debug!(path = %_path, "skipping residual node");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(skipped)
}

fn paths(index: &NodeIndex, indices: impl Iterator<Item = usize>) -> Vec<AddressPath> {
    indices
        .filter_map(|idx| index.record(idx))
        .map(|record| record.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, parse};
    use facet_testhelpers::test;

    fn run(old_html: &str, new_html: &str) -> (Document, Document, AlignReport) {
        let mut old_doc = parse(old_html);
        let mut new_doc = parse(new_html);
        let old_body = old_doc.body().unwrap();
        let new_body = new_doc.body().unwrap();
        let report = {
            let mut old = Annotator::new(&mut old_doc, Side::Old);
            let mut new = Annotator::new(&mut new_doc, Side::New);
            align_documents(&mut old, old_body, &mut new, new_body, &DiffOptions::default()).unwrap()
        };
        (old_doc, new_doc, report)
    }

    fn path(s: &str) -> AddressPath {
        s.parse().unwrap()
    }

    #[test]
    fn list_type_change_is_removed_plus_added() {
        let (old_doc, new_doc, report) = run("<ul><li>A</li></ul>", "<ol><li>A</li></ol>");

        assert_eq!(report.removed, vec![path("old/0")]);
        assert_eq!(report.added, vec![path("new/0")]);
        assert_eq!(old_doc.to_html(), r#"<ul class="diff-node-removed"><li>A</li></ul>"#);
        assert_eq!(new_doc.to_html(), r#"<ol class="diff-node-added"><li>A</li></ol>"#);
    }

    #[test]
    fn changed_pair_gets_inline_markers() {
        let (old_doc, new_doc, report) = run("<p>Hello world</p>", "<p>Hello there</p>");

        assert_eq!(report.pairs, vec![(path("old/0"), path("new/0"), PairKind::Changed)]);
        assert_eq!(
            old_doc.to_html(),
            r#"<p>Hello <span class="diff-removed">world</span></p>"#
        );
        assert_eq!(
            new_doc.to_html(),
            r#"<p>Hello <span class="diff-added">there</span></p>"#
        );
    }

    #[test]
    fn whitespace_only_pair_leaves_descendants_eligible() {
        let (old_doc, new_doc, report) = run(
            "<div><p>a  b</p><p>x</p></div>",
            "<div><p>a b</p><p>x</p></div>",
        );

        assert_eq!(report.classification(&path("old/0")), Some(Classification::Untouched));
        assert_eq!(report.classification(&path("old/0/0")), Some(Classification::Untouched));
        assert_eq!(report.classification(&path("old/0/1")), Some(Classification::Identical));
        assert!(!old_doc.to_html().contains("diff-"));
        assert!(!new_doc.to_html().contains("diff-"));
    }

    #[test]
    fn decided_ancestor_covers_descendants() {
        let (old_doc, new_doc, report) = run(
            "<div><p>one</p><p>two</p></div>",
            "<section><h2>one</h2></section>",
        );

        assert_eq!(report.removed, vec![path("old/0")]);
        assert_eq!(report.added, vec![path("new/0")]);
        assert_eq!(report.classification(&path("old/0/0")), Some(Classification::Covered));
        assert_eq!(report.classification(&path("old/0/1")), Some(Classification::Covered));
        assert_eq!(report.classification(&path("new/0/0")), Some(Classification::Covered));
        assert_eq!(old_doc.to_html().matches("diff-node-removed").count(), 1);
        assert_eq!(new_doc.to_html().matches("diff-node-added").count(), 1);
    }

    #[test]
    fn every_element_is_classified_once() {
        let (_, _, report) = run(
            "<h1>T</h1><ul><li>a</li><li>b</li></ul><p>end</p>",
            "<h1>T</h1><ul><li>a</li><li>c</li><li>d</li></ul>",
        );
        assert_eq!(report.old_classes.len(), 5);
        assert_eq!(report.new_classes.len(), 5);
        let mut seen: Vec<_> = report.old_classes.iter().map(|(p, _)| p.clone()).collect();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }
}
