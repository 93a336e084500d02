use divan::{Bencher, black_box};
use redraft::{Comparator, diff_words};

fn main() {
    divan::main();
}

/// A document of `paragraphs` paragraphs with some inline formatting.
fn document(paragraphs: usize) -> String {
    let mut html = String::new();
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p class=\"para\">Paragraph {i} has <b>bold words</b>, some <em>emphasis</em> and plain text that goes on for a while.</p>"
        ));
        if i % 10 == 0 {
            html.push_str("<ul><li>first item</li><li>second item</li></ul>");
        }
    }
    html
}

/// Same text, one list turned into an ordered list.
fn restructure(html: &str) -> String {
    html.replacen("<ul>", "<ol>", 1).replacen("</ul>", "</ol>", 1)
}

/// A few words changed.
fn reword(html: &str) -> String {
    html.replacen("bold words", "strong words", 3)
        .replacen("plain text", "ordinary prose", 2)
}

#[divan::bench(args = [10, 100, 500])]
fn compare_textual(bencher: Bencher, paragraphs: usize) {
    let old = document(paragraphs);
    let new = reword(&old);
    let comparator = Comparator::new();
    bencher.bench_local(|| {
        let outcome = comparator.compare(black_box(&old), black_box(&new));
        black_box(outcome);
    });
}

#[divan::bench(args = [10, 100, 500])]
fn compare_structural(bencher: Bencher, paragraphs: usize) {
    let old = document(paragraphs);
    let new = restructure(&old);
    let comparator = Comparator::new();
    bencher.bench_local(|| {
        let outcome = comparator.compare(black_box(&old), black_box(&new));
        black_box(outcome);
    });
}

#[divan::bench]
fn compare_identical(bencher: Bencher) {
    let html = document(500);
    let comparator = Comparator::new();
    bencher.bench_local(|| {
        let outcome = comparator.compare(black_box(&html), black_box(&html));
        black_box(outcome);
    });
}

#[divan::bench]
fn word_diff_paragraph(bencher: Bencher) {
    let old = "The quick brown fox jumps over the lazy dog, then naps in the afternoon sun.";
    let new = "The quick red fox leaps over the sleepy dog, then naps in the warm sun!";
    bencher.bench_local(|| {
        let ops = diff_words(black_box(old), black_box(new)).unwrap();
        black_box(ops);
    });
}
