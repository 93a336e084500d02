//! Inline view: delegate to a whole-document differ.

use crate::dom::parse;
use crate::options::DiffOptions;

/// Merges two HTML fragments into one annotated fragment.
///
/// Implemented for any `Fn(&str, &str) -> String`.
pub trait WholeDocumentDiff {
    /// Merge `old_html` and `new_html`.
    fn diff(&self, old_html: &str, new_html: &str) -> String;
}

impl<F> WholeDocumentDiff for F
where
    F: Fn(&str, &str) -> String,
{
    fn diff(&self, old_html: &str, new_html: &str) -> String {
        self(old_html, new_html)
    }
}

/// Re-serialize a fragment without the editor's private attributes.
pub fn strip_private_attrs(html: &str, opts: &DiffOptions) -> String {
    let mut doc = parse(html);
    let Some(body) = doc.body() else {
        return html.to_string();
    };

    let elements: Vec<_> = body.descendants(&doc.arena).collect();
    for id in elements {
        if let Some(elem) = doc.element_mut(id) {
            elem.attrs.retain(|name, _| !opts.is_private_attr(name));
        }
    }

    doc.to_html_with_options(&opts.serialize)
}
