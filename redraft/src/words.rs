//! Word-granular text diff.
//!
//! The pipeline:
//! 1. Map spaces to a private-use placeholder so whitespace is never folded
//!    away by the cleanup heuristics
//! 2. Myers character diff (via `similar`), merged into runs
//! 3. Merge pass, semantic cleanup, then efficiency cleanup
//! 4. Map the placeholder back to spaces
//! 5. Widen every change to the whole words it touches
//! 6. Re-tokenize every changed fragment into words, punctuation and whitespace
//!
//! The result always reconstructs both inputs; this is checked before
//! returning.

mod cleanup;

use facet::Facet;
use similar::{Algorithm, ChangeTag, TextDiff};

use crate::error::DiffError;
use crate::trace;
use cleanup::Chunk;

/// Stands in for U+0020 during the character diff.
const SPACE_PLACEHOLDER: char = '\u{E000}';

/// Operation of a diff fragment.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Present on both sides
    Equal,
    /// Only in the old text
    Delete,
    /// Only in the new text
    Insert,
}

/// A text fragment tagged with its operation.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct DiffOp {
    /// What happened to the fragment
    pub op: Op,
    /// The fragment
    pub text: String,
}

impl DiffOp {
    /// Create a fragment.
    pub fn new(op: Op, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    /// Whether the fragment is a deletion or an insertion.
    pub fn is_change(&self) -> bool {
        self.op != Op::Equal
    }

    /// Whether the fragment contains anything besides whitespace.
    pub fn is_significant(&self) -> bool {
        self.text.chars().any(|c| !c.is_whitespace())
    }
}

/// The old text: every fragment that is not an insertion.
pub fn old_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| op.op != Op::Insert)
        .map(|op| op.text.as_str())
        .collect()
}

/// The new text: every fragment that is not a deletion.
pub fn new_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| op.op != Op::Delete)
        .map(|op| op.text.as_str())
        .collect()
}

/// Whether any changed fragment has non-whitespace content.
pub fn has_significant_change(ops: &[DiffOp]) -> bool {
    ops.iter().any(|op| op.is_change() && op.is_significant())
}

/// Diff two texts at word granularity.
///
/// Deterministic: the output depends on the inputs only. Fails with
/// [`DiffError::Reconstruction`] if the fragments would not reproduce either
/// input.
pub fn diff_words(old: &str, new: &str) -> Result<Vec<DiffOp>, DiffError> {
    if old == new {
        return Ok(if old.is_empty() {
            Vec::new()
        } else {
            vec![DiffOp::new(Op::Equal, old)]
        });
    }

    // If the placeholder already occurs in the input, mapping would be lossy
    let encode = !old.contains(SPACE_PLACEHOLDER) && !new.contains(SPACE_PLACEHOLDER);
    let (old_mapped, new_mapped) = if encode {
        (encode_spaces(old), encode_spaces(new))
    } else {
        (old.to_string(), new.to_string())
    };

    let mut chunks = char_diff(&old_mapped, &new_mapped);
    trace!(raw = chunks.len(), "char diff");
    cleanup::cleanup_merge(&mut chunks);
    cleanup::cleanup_semantic(&mut chunks);
    cleanup::cleanup_efficiency(&mut chunks);
    trace!(cleaned = chunks.len(), "after cleanup");

    let segments = widen_to_words(fold_segments(chunks, encode));

    let mut ops = Vec::with_capacity(segments.len() * 2);
    for segment in &segments {
        match segment {
            Segment::Equal(text) => push_fragment(&mut ops, Op::Equal, text),
            Segment::Change { delete, insert } => {
                for token in tokenize(delete) {
                    push_fragment(&mut ops, Op::Delete, token);
                }
                for token in tokenize(insert) {
                    push_fragment(&mut ops, Op::Insert, token);
                }
            }
        }
    }

    if old_text(&ops) != old {
        return Err(DiffError::Reconstruction {
            side: "old".to_string(),
        });
    }
    if new_text(&ops) != new {
        return Err(DiffError::Reconstruction {
            side: "new".to_string(),
        });
    }
    Ok(ops)
}

fn push_fragment(ops: &mut Vec<DiffOp>, op: Op, text: &str) {
    if !text.is_empty() {
        ops.push(DiffOp::new(op, text));
    }
}

fn encode_spaces(text: &str) -> String {
    text.replace(' ', "\u{E000}")
}

fn decode_char(c: char) -> char {
    if c == SPACE_PLACEHOLDER { ' ' } else { c }
}

/// Cleaned diff, with every stretch between two equalities folded into one
/// change.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Equal(String),
    Change { delete: String, insert: String },
}

fn fold_segments(chunks: Vec<Chunk>, encode: bool) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let text: String = if encode {
            chunk.text.iter().map(|&c| decode_char(c)).collect()
        } else {
            chunk.text.iter().collect()
        };
        if text.is_empty() {
            continue;
        }
        let target = match (chunk.op, out.last_mut()) {
            (Op::Equal, Some(Segment::Equal(prev))) => Some(prev),
            (Op::Delete, Some(Segment::Change { delete, .. })) => Some(delete),
            (Op::Insert, Some(Segment::Change { insert, .. })) => Some(insert),
            _ => None,
        };
        if let Some(target) = target {
            target.push_str(&text);
            continue;
        }
        out.push(match chunk.op {
            Op::Equal => Segment::Equal(text),
            Op::Delete => Segment::Change {
                delete: text,
                insert: String::new(),
            },
            Op::Insert => Segment::Change {
                delete: String::new(),
                insert: text,
            },
        });
    }
    out
}

fn starts_in_word(text: &str) -> bool {
    text.chars().next().is_some_and(|c| token_kind(c) == TokenKind::Word)
}

fn ends_in_word(text: &str) -> bool {
    text.chars().next_back().is_some_and(|c| token_kind(c) == TokenKind::Word)
}

/// Split off the word characters at the end of `text`.
fn take_word_tail(text: &mut String) -> String {
    let cut = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| token_kind(c) == TokenKind::Word)
        .last()
        .map_or(text.len(), |(idx, _)| idx);
    text.split_off(cut)
}

/// Split off the word characters at the start of `text`.
fn take_word_head(text: &mut String) -> String {
    let cut = text
        .char_indices()
        .find(|&(_, c)| token_kind(c) != TokenKind::Word)
        .map_or(text.len(), |(idx, _)| idx);
    let rest = text.split_off(cut);
    std::mem::replace(text, rest)
}

/// Move the word characters around each change into both of its sides, so a
/// change never covers part of a word.
///
/// `ca[t→r] sat` becomes `[cat→car] sat`. Equalities emptied this way
/// disappear and the changes on either side join.
fn widen_to_words(mut segments: Vec<Segment>) -> Vec<Segment> {
    for idx in 0..segments.len() {
        let (left, right) = match &segments[idx] {
            Segment::Change { delete, insert } => (
                starts_in_word(delete) || starts_in_word(insert),
                ends_in_word(delete) || ends_in_word(insert),
            ),
            Segment::Equal(_) => continue,
        };

        let head = match (left, idx.checked_sub(1).map(|prev| &mut segments[prev])) {
            (true, Some(Segment::Equal(prev))) => take_word_tail(prev),
            _ => String::new(),
        };
        let tail = match (right, segments.get_mut(idx + 1)) {
            (true, Some(Segment::Equal(next))) => take_word_head(next),
            _ => String::new(),
        };
        if head.is_empty() && tail.is_empty() {
            continue;
        }
        if let Segment::Change { delete, insert } = &mut segments[idx] {
            trace!(head = %head, tail = %tail, "widening change to whole words");
            delete.insert_str(0, &head);
            delete.push_str(&tail);
            insert.insert_str(0, &head);
            insert.push_str(&tail);
        }
    }

    let mut widened: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Equal(text) if text.is_empty() => {}
            Segment::Change { delete, insert } => {
                if let Some(Segment::Change {
                    delete: prev_delete,
                    insert: prev_insert,
                }) = widened.last_mut()
                {
                    prev_delete.push_str(&delete);
                    prev_insert.push_str(&insert);
                    continue;
                }
                widened.push(Segment::Change { delete, insert });
            }
            segment => widened.push(segment),
        }
    }
    widened
}

/// Myers diff over chars, consecutive changes of one kind merged into a run.
fn char_diff(old: &str, new: &str) -> Vec<Chunk> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);

    let mut chunks: Vec<Chunk> = Vec::new();
    for change in diff.iter_all_changes() {
        let op = match change.tag() {
            ChangeTag::Equal => Op::Equal,
            ChangeTag::Delete => Op::Delete,
            ChangeTag::Insert => Op::Insert,
        };
        match chunks.last_mut() {
            Some(last) if last.op == op => last.text.extend(change.value().chars()),
            _ => chunks.push(Chunk {
                op,
                text: change.value().chars().collect(),
            }),
        }
    }
    chunks
}

/// Punctuation splits words and is highlighted on its own.
pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}'
                | '\u{00A7}'
                | '\u{00AB}'
                | '\u{00B6}'
                | '\u{00B7}'
                | '\u{00BB}'
                | '\u{00BF}'
                | '\u{2010}'..='\u{2027}'
                | '\u{2030}'..='\u{205E}'
                | '\u{3001}'..='\u{3003}'
                | '\u{3008}'..='\u{3011}'
                | '\u{FF01}'..='\u{FF0F}'
                | '\u{FF1A}'..='\u{FF1F}'
        )
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Whitespace,
    Punctuation,
    Word,
}

fn token_kind(c: char) -> TokenKind {
    if c.is_whitespace() {
        TokenKind::Whitespace
    } else if is_punctuation(c) {
        TokenKind::Punctuation
    } else {
        TokenKind::Word
    }
}

/// Split into whitespace runs, single punctuation chars, and word runs.
///
/// The tokens concatenate back to `text`.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<TokenKind> = None;

    for (idx, c) in text.char_indices() {
        let kind = token_kind(c);
        let boundary = match current {
            None => false,
            Some(TokenKind::Punctuation) => true,
            Some(prev) => prev != kind,
        };
        if boundary {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        current = Some(kind);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn changes(ops: &[DiffOp]) -> Vec<(Op, &str)> {
        ops.iter()
            .filter(|op| op.is_change())
            .map(|op| (op.op, op.text.as_str()))
            .collect()
    }

    #[test]
    fn whole_words_are_flagged() {
        let ops = diff_words("Hello world", "Hello there").unwrap();
        assert_eq!(
            changes(&ops),
            vec![(Op::Delete, "world"), (Op::Insert, "there")]
        );
        assert_eq!(ops[0], DiffOp::new(Op::Equal, "Hello "));
    }

    #[test]
    fn partial_word_edits_cover_the_whole_word() {
        let ops = diff_words("The cat sat", "The car sat").unwrap();
        assert_eq!(
            ops,
            vec![
                DiffOp::new(Op::Equal, "The "),
                DiffOp::new(Op::Delete, "cat"),
                DiffOp::new(Op::Insert, "car"),
                DiffOp::new(Op::Equal, " sat"),
            ]
        );

        let ops = diff_words("one cat", "one cats").unwrap();
        assert_eq!(
            changes(&ops),
            vec![(Op::Delete, "cat"), (Op::Insert, "cats")]
        );
    }

    #[test]
    fn widening_stops_at_punctuation_and_space() {
        let ops = diff_words("cat, sat", "car, sat").unwrap();
        assert_eq!(
            changes(&ops),
            vec![(Op::Delete, "cat"), (Op::Insert, "car")]
        );
        assert_eq!(ops.last(), Some(&DiffOp::new(Op::Equal, ", sat")));
    }

    #[test]
    fn widening_joins_changes_that_share_a_word() {
        let segments = vec![
            Segment::Equal("x ".to_string()),
            Segment::Change {
                delete: "a".to_string(),
                insert: "b".to_string(),
            },
            Segment::Equal("mid".to_string()),
            Segment::Change {
                delete: "c".to_string(),
                insert: "d".to_string(),
            },
            Segment::Equal(" y".to_string()),
        ];
        assert_eq!(
            widen_to_words(segments),
            vec![
                Segment::Equal("x ".to_string()),
                Segment::Change {
                    delete: "amidc".to_string(),
                    insert: "bmidd".to_string(),
                },
                Segment::Equal(" y".to_string()),
            ]
        );
    }

    #[test]
    fn changes_are_merged_into_single_stretches() {
        let ops = diff_words("abcd efgh ijkl", "axcy efgh iqkz").unwrap();
        for pair in ops.windows(2) {
            assert!(
                !(pair[0].op == Op::Equal && pair[1].op == Op::Equal),
                "{ops:?}"
            );
            assert!(
                !(pair[0].op == Op::Insert && pair[1].op == Op::Delete),
                "{ops:?}"
            );
        }
        assert_eq!(
            changes(&ops),
            vec![
                (Op::Delete, "abcd"),
                (Op::Insert, "axcy"),
                (Op::Delete, "ijkl"),
                (Op::Insert, "iqkz"),
            ]
        );
    }

    #[test]
    fn extra_space_is_a_real_deletion() {
        let ops = diff_words("a  b", "a b").unwrap();
        assert_eq!(changes(&ops), vec![(Op::Delete, " ")]);
        assert!(!has_significant_change(&ops));
    }

    #[test]
    fn identical_texts_are_one_equality() {
        assert_eq!(
            diff_words("same", "same").unwrap(),
            vec![DiffOp::new(Op::Equal, "same")]
        );
        assert!(diff_words("", "").unwrap().is_empty());
    }

    #[test]
    fn insertion_into_empty_is_tokenized() {
        let ops = diff_words("", "Hi, you").unwrap();
        assert_eq!(
            changes(&ops),
            vec![
                (Op::Insert, "Hi"),
                (Op::Insert, ","),
                (Op::Insert, " "),
                (Op::Insert, "you"),
            ]
        );
    }

    #[test]
    fn reconstructs_both_sides() {
        let pairs = [
            ("The quick brown fox.", "The quick red fox jumps."),
            ("a\u{E000}b", "a b c"),
            ("naïve café", "naive cafe!"),
            ("line one\nline two", "line one\n\nline 2"),
            ("  leading", "trailing  "),
        ];
        for (old, new) in pairs {
            let ops = diff_words(old, new).unwrap();
            assert_eq!(old_text(&ops), old);
            assert_eq!(new_text(&ops), new);
            assert!(ops.iter().all(|op| !op.text.is_empty()));
        }
    }

    #[test]
    fn changed_fragments_never_mix_kinds() {
        let ops = diff_words("alpha beta", "gamma, delta!").unwrap();
        for op in ops.iter().filter(|op| op.is_change()) {
            let kinds: Vec<_> = op.text.chars().map(token_kind).collect();
            assert!(kinds.windows(2).all(|w| w[0] == w[1]), "{op:?}");
            if kinds[0] == TokenKind::Punctuation {
                assert_eq!(op.text.chars().count(), 1);
            }
        }
    }

    #[test]
    fn tokenize_splits_words_punctuation_and_space() {
        assert_eq!(
            tokenize("Hello,  world!?"),
            vec!["Hello", ",", "  ", "world", "!", "?"]
        );
        assert_eq!(tokenize("“quoted”"), vec!["“", "quoted", "”"]);
        assert!(tokenize("").is_empty());
    }
}
