//! Greedy first-fit node alignment.
//!
//! Implements three passes over nodes ordered by ascending depth:
//! 1. Exact: equal signature and equal content
//! 2. Structural: equal signature, verdict delegated to a [`Judge`]
//! 3. Residual: leftovers become removed (old side) or added (new side)

use crate::{debug, trace};

/// A tree as seen by the aligner: a flat list of records in pre-order.
///
/// Records are addressed by their index in `0..len()`. The parent lookup is a
/// plain function so that implementors can keep records in a flat map instead
/// of a pointer structure.
pub trait AlignTree {
    /// Number of records.
    fn len(&self) -> usize;

    /// Whether the tree has no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth of a record below the root (direct children are at depth 0).
    fn depth(&self, idx: usize) -> usize;

    /// The closest indexed ancestor of a record.
    fn parent(&self, idx: usize) -> Option<usize>;

    /// Structural fingerprint. Equal signatures make two records candidates.
    fn signature(&self, idx: usize) -> &str;

    /// Full content of the record's subtree.
    fn content(&self, idx: usize) -> &str;
}

/// Outcome of inspecting a signature-equal pair during the structural pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The pair differs meaningfully: both nodes become decided.
    Changed,
    /// The pair differs only in insignificant ways: descendants stay eligible.
    WhitespaceOnly,
}

/// Decides whether a structural pair really changed.
///
/// Implemented for any `FnMut(old_idx, new_idx) -> Result<Verdict, E>`.
pub trait Judge {
    /// Error aborting the whole alignment.
    type Error;

    /// Inspect the pair `(old, new)`.
    fn judge(&mut self, old: usize, new: usize) -> Result<Verdict, Self::Error>;
}

impl<F, E> Judge for F
where
    F: FnMut(usize, usize) -> Result<Verdict, E>,
{
    type Error = E;

    fn judge(&mut self, old: usize, new: usize) -> Result<Verdict, E> {
        self(old, new)
    }
}

/// How a pair was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Equal signature and equal content
    Identical,
    /// Equal signature, content changed meaningfully
    Changed,
    /// Equal signature, content differs only insignificantly
    Untouched,
}

/// A pairing between an old record and a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    /// Index of the old record
    pub old: usize,
    /// Index of the new record
    pub new: usize,
    /// How the pair was formed
    pub kind: PairKind,
}

/// Final classification of a record. Every record gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Paired in the exact pass
    Identical,
    /// Paired in the structural pass with a meaningful change
    Changed,
    /// Paired in the structural pass, only insignificant differences
    Untouched,
    /// Old record with no counterpart
    Removed,
    /// New record with no counterpart
    Added,
    /// Left alone because an ancestor's decision covers it
    Covered,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    partner: Option<usize>,
    decided: bool,
    class: Option<Classification>,
}

/// The result of [`align`]: pairs plus a classification for every record.
#[derive(Debug, Clone)]
pub struct Alignment {
    old: Vec<Slot>,
    new: Vec<Slot>,
    pairs: Vec<Pair>,
}

impl Alignment {
    fn new(old_len: usize, new_len: usize) -> Self {
        Self {
            old: vec![Slot::default(); old_len],
            new: vec![Slot::default(); new_len],
            pairs: Vec::new(),
        }
    }

    fn pair(&mut self, old: usize, new: usize, kind: PairKind) {
        let class = match kind {
            PairKind::Identical => Classification::Identical,
            PairKind::Changed => Classification::Changed,
            PairKind::Untouched => Classification::Untouched,
        };
        let decided = kind != PairKind::Untouched;

        for (slot, partner) in [(&mut self.old[old], new), (&mut self.new[new], old)] {
            slot.partner = Some(partner);
            slot.decided = decided;
            slot.class = Some(class);
        }
        self.pairs.push(Pair { old, new, kind });
    }

    /// All pairs, in the order they were formed.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Old records classified as removed, in visiting order.
    pub fn removed(&self) -> impl Iterator<Item = usize> + '_ {
        with_class(&self.old, Classification::Removed)
    }

    /// New records classified as added, in visiting order.
    pub fn added(&self) -> impl Iterator<Item = usize> + '_ {
        with_class(&self.new, Classification::Added)
    }

    /// Classification of an old record.
    pub fn old_class(&self, idx: usize) -> Classification {
        self.old[idx].class.unwrap_or(Classification::Covered)
    }

    /// Classification of a new record.
    pub fn new_class(&self, idx: usize) -> Classification {
        self.new[idx].class.unwrap_or(Classification::Covered)
    }

    /// The new record paired with an old record.
    pub fn partner_of_old(&self, idx: usize) -> Option<usize> {
        self.old[idx].partner
    }

    /// The old record paired with a new record.
    pub fn partner_of_new(&self, idx: usize) -> Option<usize> {
        self.new[idx].partner
    }
}

fn with_class(slots: &[Slot], class: Classification) -> impl Iterator<Item = usize> + '_ {
    slots
        .iter()
        .enumerate()
        .filter(move |(_, slot)| slot.class == Some(class))
        .map(|(idx, _)| idx)
}

/// Records sorted by ascending depth, ties kept in pre-order.
fn visit_order<T: AlignTree + ?Sized>(tree: &T) -> Vec<usize> {
    let mut order: Vec<usize> = (0..tree.len()).collect();
    order.sort_by_key(|&idx| tree.depth(idx));
    order
}

fn has_decided_ancestor<T: AlignTree + ?Sized>(tree: &T, slots: &[Slot], idx: usize) -> bool {
    let mut current = tree.parent(idx);
    while let Some(ancestor) = current {
        if slots[ancestor].decided {
            return true;
        }
        current = tree.parent(ancestor);
    }
    false
}

fn eligible<T: AlignTree + ?Sized>(tree: &T, slots: &[Slot], idx: usize) -> bool {
    slots[idx].partner.is_none() && !has_decided_ancestor(tree, slots, idx)
}

/// Align two trees.
///
/// Deterministic and total: every record of both trees ends with exactly one
/// [`Classification`]. The judge is consulted once per structural pair; its
/// first error aborts the alignment.
pub fn align<TA, TB, J>(old: &TA, new: &TB, mut judge: J) -> Result<Alignment, J::Error>
where
    TA: AlignTree + ?Sized,
    TB: AlignTree + ?Sized,
    J: Judge,
{
    debug!(old = old.len(), new = new.len(), "align start");

    let old_order = visit_order(old);
    let new_order = visit_order(new);
    let mut alignment = Alignment::new(old.len(), new.len());

    exact_pass(old, new, &old_order, &new_order, &mut alignment);
    debug!(pairs = alignment.pairs.len(), "after exact pass");

    structural_pass(old, new, &old_order, &new_order, &mut alignment, &mut judge)?;
    debug!(pairs = alignment.pairs.len(), "after structural pass");

    residual_pass(old, &old_order, &mut alignment.old, Classification::Removed);
    residual_pass(new, &new_order, &mut alignment.new, Classification::Added);
    debug!(
        removed = alignment.removed().count(),
        added = alignment.added().count(),
        "after residual pass"
    );

    Ok(alignment)
}

fn exact_pass<TA, TB>(
    old: &TA,
    new: &TB,
    old_order: &[usize],
    new_order: &[usize],
    alignment: &mut Alignment,
) where
    TA: AlignTree + ?Sized,
    TB: AlignTree + ?Sized,
{
    for &a in old_order {
        if !eligible(old, &alignment.old, a) {
            continue;
        }
        let candidate = new_order.iter().copied().find(|&b| {
            eligible(new, &alignment.new, b)
                && old.signature(a) == new.signature(b)
                && old.content(a) == new.content(b)
        });
        if let Some(b) = candidate {
            trace!(a, b, signature = old.signature(a), "exact pair");
            alignment.pair(a, b, PairKind::Identical);
        }
    }
}

fn structural_pass<TA, TB, J>(
    old: &TA,
    new: &TB,
    old_order: &[usize],
    new_order: &[usize],
    alignment: &mut Alignment,
    judge: &mut J,
) -> Result<(), J::Error>
where
    TA: AlignTree + ?Sized,
    TB: AlignTree + ?Sized,
    J: Judge,
{
    for &a in old_order {
        if !eligible(old, &alignment.old, a) {
            continue;
        }
        let candidate = new_order
            .iter()
            .copied()
            .find(|&b| eligible(new, &alignment.new, b) && old.signature(a) == new.signature(b));
        let Some(b) = candidate else {
            continue;
        };

        let kind = match judge.judge(a, b)? {
            Verdict::Changed => PairKind::Changed,
            Verdict::WhitespaceOnly => PairKind::Untouched,
        };
        trace!(a, b, ?kind, "structural pair");
        alignment.pair(a, b, kind);
    }
    Ok(())
}

fn residual_pass<T: AlignTree + ?Sized>(
    tree: &T,
    order: &[usize],
    slots: &mut [Slot],
    class: Classification,
) {
    for &idx in order {
        if slots[idx].class.is_some() {
            continue;
        }
        if has_decided_ancestor(tree, slots, idx) {
            slots[idx].class = Some(Classification::Covered);
            continue;
        }
        trace!(idx, ?class, "residual");
        slots[idx].decided = true;
        slots[idx].class = Some(class);
    }
}
