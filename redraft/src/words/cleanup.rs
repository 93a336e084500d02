//! Post-processing of a raw character diff.
//!
//! The raw Myers output is correct but noisy: it happily matches a stray `e`
//! in the middle of two unrelated words. The passes here trade minimality for
//! readability, then fold cheap equalities into the edits around them.
//!
//! All lengths are counted in chars.

use super::Op;

/// Cost of an empty edit in terms of characters, for [`cleanup_efficiency`].
pub(super) const EDIT_COST: usize = 4;

/// A diff fragment while cleanup is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Chunk {
    pub op: Op,
    pub text: Vec<char>,
}

impl Chunk {
    pub fn new(op: Op, text: &[char]) -> Self {
        Self {
            op,
            text: text.to_vec(),
        }
    }
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Length of the longest suffix of `a` that is a prefix of `b`.
fn common_overlap(a: &[char], b: &[char]) -> usize {
    let max = a.len().min(b.len());
    (1..=max)
        .rev()
        .find(|&k| a[a.len() - k..] == b[..k])
        .unwrap_or(0)
}

/// Reorder and merge like edit sections, factor out common prefixes and
/// suffixes, and shift single edits sideways over equalities.
pub(super) fn cleanup_merge(chunks: &mut Vec<Chunk>) {
    loop {
        merge_runs(chunks);
        if !shift_single_edits(chunks) {
            return;
        }
    }
}

fn merge_runs(chunks: &mut Vec<Chunk>) {
    // Sentinel equality flushes the trailing run
    chunks.push(Chunk::new(Op::Equal, &[]));

    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete: Vec<char> = Vec::new();
    let mut text_insert: Vec<char> = Vec::new();

    while pointer < chunks.len() {
        match chunks[pointer].op {
            Op::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&chunks[pointer].text);
                pointer += 1;
            }
            Op::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&chunks[pointer].text);
                pointer += 1;
            }
            Op::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let prefix = common_prefix(&text_insert, &text_delete);
                        if prefix != 0 {
                            let start = pointer - count_delete - count_insert;
                            if start > 0 && chunks[start - 1].op == Op::Equal {
                                chunks[start - 1]
                                    .text
                                    .extend_from_slice(&text_insert[..prefix]);
                            } else {
                                chunks.insert(0, Chunk::new(Op::Equal, &text_insert[..prefix]));
                                pointer += 1;
                            }
                            text_insert.drain(..prefix);
                            text_delete.drain(..prefix);
                        }

                        let suffix = common_suffix(&text_insert, &text_delete);
                        if suffix != 0 {
                            let mut text = text_insert[text_insert.len() - suffix..].to_vec();
                            text.extend_from_slice(&chunks[pointer].text);
                            chunks[pointer].text = text;
                            text_insert.truncate(text_insert.len() - suffix);
                            text_delete.truncate(text_delete.len() - suffix);
                        }
                    }

                    let start = pointer - count_delete - count_insert;
                    let mut merged = Vec::with_capacity(2);
                    if !text_delete.is_empty() {
                        merged.push(Chunk::new(Op::Delete, &text_delete));
                    }
                    if !text_insert.is_empty() {
                        merged.push(Chunk::new(Op::Insert, &text_insert));
                    }
                    let merged_len = merged.len();
                    chunks.splice(start..pointer, merged);
                    pointer = start + merged_len + 1;
                } else if pointer != 0 && chunks[pointer - 1].op == Op::Equal {
                    let text = core::mem::take(&mut chunks[pointer].text);
                    chunks[pointer - 1].text.extend(text);
                    chunks.remove(pointer);
                } else {
                    pointer += 1;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }

    if chunks.last().is_some_and(|chunk| chunk.text.is_empty()) {
        chunks.pop();
    }
}

/// `A<ins>BA</ins>C` becomes `<ins>AB</ins>AC`, and the mirror image.
fn shift_single_edits(chunks: &mut Vec<Chunk>) -> bool {
    let mut changes = false;
    let mut pointer = 1;
    while pointer + 1 < chunks.len() {
        if chunks[pointer - 1].op == Op::Equal && chunks[pointer + 1].op == Op::Equal {
            let prev = chunks[pointer - 1].text.clone();
            let next = chunks[pointer + 1].text.clone();
            let edit = chunks[pointer].text.clone();

            if edit.ends_with(&prev) {
                let mut shifted = prev.clone();
                shifted.extend_from_slice(&edit[..edit.len() - prev.len()]);
                chunks[pointer].text = shifted;

                let mut following = prev;
                following.extend_from_slice(&next);
                chunks[pointer + 1].text = following;

                chunks.remove(pointer - 1);
                changes = true;
            } else if edit.starts_with(&next) {
                chunks[pointer - 1].text.extend_from_slice(&next);

                let mut shifted = edit[next.len()..].to_vec();
                shifted.extend_from_slice(&next);
                chunks[pointer].text = shifted;

                chunks.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }
    changes
}

/// Eliminate equalities that are dominated by the edits on both sides, then
/// align edits to word boundaries and extract overlaps.
pub(super) fn cleanup_semantic(chunks: &mut Vec<Chunk>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<usize> = None;
    let mut inserted_before = 0;
    let mut deleted_before = 0;
    let mut inserted_after = 0;
    let mut deleted_after = 0;

    let mut pointer = 0;
    while pointer < chunks.len() {
        let len = chunks[pointer].text.len();
        match chunks[pointer].op {
            Op::Equal => {
                equalities.push(pointer);
                inserted_before = inserted_after;
                deleted_before = deleted_after;
                inserted_after = 0;
                deleted_after = 0;
                last_equality = Some(len);
                pointer += 1;
            }
            op => {
                if op == Op::Insert {
                    inserted_after += len;
                } else {
                    deleted_after += len;
                }

                let dominated = last_equality.is_some_and(|eq_len| {
                    eq_len <= inserted_before.max(deleted_before)
                        && eq_len <= inserted_after.max(deleted_after)
                });
                let Some(&at) = equalities.last().filter(|_| dominated) else {
                    pointer += 1;
                    continue;
                };

                // Split the equality into a delete + insert pair
                let text = chunks[at].text.clone();
                chunks.insert(at, Chunk::new(Op::Delete, &text));
                chunks[at + 1].op = Op::Insert;

                // The split equality and the one before it need reevaluation
                equalities.pop();
                equalities.pop();
                pointer = equalities.last().map_or(0, |&idx| idx + 1);

                inserted_before = 0;
                deleted_before = 0;
                inserted_after = 0;
                deleted_after = 0;
                last_equality = None;
                changes = true;
            }
        }
    }

    if changes {
        cleanup_merge(chunks);
    }
    cleanup_semantic_lossless(chunks);
    extract_overlaps(chunks);
}

/// `<del>abcxxx</del><ins>xxxdef</ins>` becomes `<del>abc</del>xxx<ins>def</ins>`
/// when the overlap is at least half of either edit.
fn extract_overlaps(chunks: &mut Vec<Chunk>) {
    let mut pointer = 1;
    while pointer < chunks.len() {
        if chunks[pointer - 1].op == Op::Delete && chunks[pointer].op == Op::Insert {
            let deletion = chunks[pointer - 1].text.clone();
            let insertion = chunks[pointer].text.clone();
            let forward = common_overlap(&deletion, &insertion);
            let backward = common_overlap(&insertion, &deletion);

            if forward >= backward {
                if forward * 2 >= deletion.len() || forward * 2 >= insertion.len() {
                    chunks.insert(pointer, Chunk::new(Op::Equal, &insertion[..forward]));
                    chunks[pointer - 1].text = deletion[..deletion.len() - forward].to_vec();
                    chunks[pointer + 1].text = insertion[forward..].to_vec();
                    pointer += 1;
                }
            } else if backward * 2 >= deletion.len() || backward * 2 >= insertion.len() {
                chunks.insert(pointer, Chunk::new(Op::Equal, &deletion[..backward]));
                chunks[pointer - 1] =
                    Chunk::new(Op::Insert, &insertion[..insertion.len() - backward]);
                chunks[pointer + 1] = Chunk::new(Op::Delete, &deletion[backward..]);
                pointer += 1;
            }
            pointer += 1;
        }
        pointer += 1;
    }
    chunks.retain(|chunk| !chunk.text.is_empty());
}

/// Shift single edits surrounded by equalities so that they sit on the best
/// boundary: blank lines, then line breaks, then sentence ends, then spaces.
fn cleanup_semantic_lossless(chunks: &mut Vec<Chunk>) {
    let mut pointer = 1;
    while pointer + 1 < chunks.len() {
        if chunks[pointer - 1].op != Op::Equal || chunks[pointer + 1].op != Op::Equal {
            pointer += 1;
            continue;
        }

        let mut equality1 = chunks[pointer - 1].text.clone();
        let mut edit = chunks[pointer].text.clone();
        let mut equality2 = chunks[pointer + 1].text.clone();

        // Shift the edit as far left as possible
        let suffix = common_suffix(&equality1, &edit);
        if suffix != 0 {
            let common = edit[edit.len() - suffix..].to_vec();
            equality1.truncate(equality1.len() - suffix);
            let mut shifted = common.clone();
            shifted.extend_from_slice(&edit[..edit.len() - suffix]);
            edit = shifted;
            let mut following = common;
            following.extend_from_slice(&equality2);
            equality2 = following;
        }

        // Then step right one char at a time, keeping the best-scoring fit
        let mut best = (equality1.clone(), edit.clone(), equality2.clone());
        let mut best_score = semantic_score(&equality1, &edit) + semantic_score(&edit, &equality2);
        while !edit.is_empty() && !equality2.is_empty() && edit[0] == equality2[0] {
            let c = edit.remove(0);
            equality1.push(c);
            edit.push(equality2.remove(0));
            let score = semantic_score(&equality1, &edit) + semantic_score(&edit, &equality2);
            // >= favors shifting right, towards the end of words
            if score >= best_score {
                best_score = score;
                best = (equality1.clone(), edit.clone(), equality2.clone());
            }
        }

        let (best_equality1, best_edit, best_equality2) = best;
        if chunks[pointer - 1].text != best_equality1 {
            if best_equality1.is_empty() {
                chunks.remove(pointer - 1);
                pointer -= 1;
            } else {
                chunks[pointer - 1].text = best_equality1;
            }
            chunks[pointer].text = best_edit;
            if best_equality2.is_empty() {
                chunks.remove(pointer + 1);
                pointer = pointer.saturating_sub(1);
            } else {
                chunks[pointer + 1].text = best_equality2;
            }
        }
        pointer += 1;
    }
}

/// Score the boundary between `one` and `two`, from 6 (best) to 0 (worst).
fn semantic_score(one: &[char], two: &[char]) -> u8 {
    let (Some(&char1), Some(&char2)) = (one.last(), two.first()) else {
        // Edges are the best
        return 6;
    };

    let non_alnum1 = !char1.is_ascii_alphanumeric();
    let non_alnum2 = !char2.is_ascii_alphanumeric();
    let whitespace1 = non_alnum1 && char1.is_whitespace();
    let whitespace2 = non_alnum2 && char2.is_whitespace();
    let line_break1 = matches!(char1, '\r' | '\n');
    let line_break2 = matches!(char2, '\r' | '\n');
    let blank_line1 = line_break1 && ends_with_blank_line(one);
    let blank_line2 = line_break2 && starts_with_blank_line(two);

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !whitespace1 && whitespace2 {
        3
    } else if whitespace1 || whitespace2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

fn ends_with_blank_line(text: &[char]) -> bool {
    text.ends_with(&['\n', '\n']) || text.ends_with(&['\n', '\r', '\n'])
}

fn starts_with_blank_line(text: &[char]) -> bool {
    let rest = match text {
        ['\r', '\n', rest @ ..] | ['\n', rest @ ..] => rest,
        _ => return false,
    };
    rest.starts_with(&['\n']) || rest.starts_with(&['\r', '\n'])
}

/// Fold short equalities into the edits around them when keeping them costs
/// more than it saves.
pub(super) fn cleanup_efficiency(chunks: &mut Vec<Chunk>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<usize> = None;
    let mut pre_insert = false;
    let mut pre_delete = false;
    let mut post_insert = false;
    let mut post_delete = false;

    let mut pointer = 0;
    while pointer < chunks.len() {
        let len = chunks[pointer].text.len();
        match chunks[pointer].op {
            Op::Equal => {
                if len < EDIT_COST && (post_insert || post_delete) {
                    equalities.push(pointer);
                    pre_insert = post_insert;
                    pre_delete = post_delete;
                    last_equality = Some(len);
                } else {
                    equalities.clear();
                    last_equality = None;
                }
                post_insert = false;
                post_delete = false;
                pointer += 1;
            }
            op => {
                if op == Op::Delete {
                    post_delete = true;
                } else {
                    post_insert = true;
                }

                // <ins>A</ins><del>B</del>XY<ins>C</ins><del>D</del> and the
                // three-sided variants where X is shorter than half an edit
                let sides = [pre_insert, pre_delete, post_insert, post_delete]
                    .iter()
                    .filter(|&&side| side)
                    .count();
                let fold = last_equality.is_some_and(|eq_len| {
                    sides == 4 || (eq_len < EDIT_COST / 2 && sides == 3)
                });
                let Some(&at) = equalities.last().filter(|_| fold) else {
                    pointer += 1;
                    continue;
                };

                let text = chunks[at].text.clone();
                chunks.insert(at, Chunk::new(Op::Delete, &text));
                chunks[at + 1].op = Op::Insert;
                equalities.pop();
                last_equality = None;
                changes = true;

                if pre_insert && pre_delete {
                    // No changes made which could affect previous entry, keep going
                    post_insert = true;
                    post_delete = true;
                    equalities.clear();
                    pointer += 1;
                } else {
                    equalities.pop();
                    pointer = equalities.last().map_or(0, |&idx| idx + 1);
                    post_insert = false;
                    post_delete = false;
                }
            }
        }
    }

    if changes {
        cleanup_merge(chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn chunks(parts: &[(Op, &str)]) -> Vec<Chunk> {
        parts.iter()
            .map(|(op, text)| Chunk {
                op: *op,
                text: text.chars().collect(),
            })
            .collect()
    }

    fn render(chunks: &[Chunk]) -> Vec<(Op, String)> {
        chunks
            .iter()
            .map(|chunk| (chunk.op, chunk.text.iter().collect()))
            .collect()
    }

    fn owned(parts: &[(Op, &str)]) -> Vec<(Op, String)> {
        parts.iter().map(|(op, text)| (*op, text.to_string())).collect()
    }

    #[test]
    fn merge_combines_like_edits() {
        let mut diff = chunks(&[
            (Op::Equal, "a"),
            (Op::Delete, "b"),
            (Op::Insert, "c"),
            (Op::Delete, "d"),
            (Op::Insert, "e"),
            (Op::Equal, "f"),
        ]);
        cleanup_merge(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[
                (Op::Equal, "a"),
                (Op::Delete, "bd"),
                (Op::Insert, "ce"),
                (Op::Equal, "f"),
            ])
        );
    }

    #[test]
    fn merge_factors_common_prefix_and_suffix() {
        let mut diff = chunks(&[
            (Op::Equal, "x"),
            (Op::Delete, "a"),
            (Op::Insert, "abc"),
            (Op::Delete, "dc"),
            (Op::Equal, "y"),
        ]);
        cleanup_merge(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[
                (Op::Equal, "xa"),
                (Op::Delete, "d"),
                (Op::Insert, "b"),
                (Op::Equal, "cy"),
            ])
        );
    }

    #[test]
    fn merge_slides_edit_left() {
        let mut diff = chunks(&[(Op::Equal, "a"), (Op::Insert, "ba"), (Op::Equal, "c")]);
        cleanup_merge(&mut diff);
        assert_eq!(render(&diff), owned(&[(Op::Insert, "ab"), (Op::Equal, "ac")]));
    }

    #[test]
    fn semantic_eliminates_dominated_equality() {
        let mut diff = chunks(&[
            (Op::Delete, "wo"),
            (Op::Insert, "the"),
            (Op::Equal, "r"),
            (Op::Delete, "ld"),
            (Op::Insert, "e"),
        ]);
        cleanup_semantic(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[(Op::Delete, "world"), (Op::Insert, "there")])
        );
    }

    #[test]
    fn semantic_keeps_large_equalities() {
        let parts = [
            (Op::Delete, "ab"),
            (Op::Insert, "cd"),
            (Op::Equal, "12"),
            (Op::Delete, "e"),
        ];
        let mut diff = chunks(&parts);
        cleanup_semantic(&mut diff);
        assert_eq!(render(&diff), owned(&parts));
    }

    #[test]
    fn lossless_moves_edit_to_word_boundary() {
        let mut diff = chunks(&[
            (Op::Equal, "The c"),
            (Op::Insert, "ow and the c"),
            (Op::Equal, "at."),
        ]);
        cleanup_semantic_lossless(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[
                (Op::Equal, "The "),
                (Op::Insert, "cow and the "),
                (Op::Equal, "cat."),
            ])
        );
    }

    #[test]
    fn overlap_is_extracted() {
        let mut diff = chunks(&[(Op::Delete, "abcxxx"), (Op::Insert, "xxxdef")]);
        cleanup_semantic(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[(Op::Delete, "abc"), (Op::Equal, "xxx"), (Op::Insert, "def")])
        );
    }

    #[test]
    fn efficiency_folds_short_equality_between_edits() {
        let mut diff = chunks(&[
            (Op::Delete, "ab"),
            (Op::Insert, "12"),
            (Op::Equal, "xyz"),
            (Op::Delete, "cd"),
            (Op::Insert, "34"),
        ]);
        cleanup_efficiency(&mut diff);
        assert_eq!(
            render(&diff),
            owned(&[(Op::Delete, "abxyzcd"), (Op::Insert, "12xyz34")])
        );
    }

    #[test]
    fn efficiency_keeps_long_equality() {
        let parts = [
            (Op::Delete, "ab"),
            (Op::Insert, "12"),
            (Op::Equal, "wxyz"),
            (Op::Delete, "cd"),
            (Op::Insert, "34"),
        ];
        let mut diff = chunks(&parts);
        cleanup_efficiency(&mut diff);
        assert_eq!(render(&diff), owned(&parts));
    }

    #[test]
    fn score_prefers_blank_lines_over_words() {
        let text = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(semantic_score(&text(""), &text("a")), 6);
        assert_eq!(semantic_score(&text("a\n\n"), &text("b")), 5);
        assert_eq!(semantic_score(&text("a\n"), &text("b")), 4);
        assert_eq!(semantic_score(&text("a."), &text(" b")), 3);
        assert_eq!(semantic_score(&text("a "), &text("b")), 2);
        assert_eq!(semantic_score(&text("a-"), &text("b")), 1);
        assert_eq!(semantic_score(&text("a"), &text("b")), 0);
    }

    #[test]
    fn tabs_score_as_plain_whitespace() {
        let text = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(semantic_score(&text("a\t"), &text("b")), 2);
        assert_eq!(semantic_score(&text("a"), &text("\u{000B}b")), 2);
        assert_eq!(semantic_score(&text("a\r"), &text("b")), 4);
    }
}
