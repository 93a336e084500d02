//! The comparison pass: route selection, annotation, fallback.

use facet::Facet;
use graft::Side;
use indextree::NodeId;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::align::align_documents;
use crate::dom::{Document, parse};
use crate::error::DiffError;
use crate::highlight::{Annotator, MarkerCounts};
use crate::inline::{WholeDocumentDiff, strip_private_attrs};
use crate::options::{DiffOptions, ViewMode};
use crate::serialize::serialize_children;
use crate::words::diff_words;
use crate::{debug, trace};

/// States a comparison moves through.
///
/// `Idle → Comparing → {StructuralOnly | TextualDiff} → Done`. Byte-identical
/// inputs and inputs that fail before routing go straight from `Comparing`
/// to `Done`.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompareState {
    /// Nothing started yet
    Idle,
    /// Inputs parsed, route being chosen
    Comparing,
    /// Same text, different markup: tree alignment
    StructuralOnly,
    /// Text differs: word diff over the whole container
    TextualDiff,
    /// Terminal state, always reached
    Done,
}

/// Which route a comparison took.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Route {
    /// Inputs were byte-identical
    Unchanged,
    /// Node alignment plus whitespace-run marking
    Structural,
    /// Word diff applied to the text-node layout
    Textual,
}

/// Result of [`Comparator::compare`].
#[derive(Facet, Debug, Clone)]
pub struct CompareOutcome {
    /// Annotated old fragment, or the old input unchanged
    pub old_html: String,
    /// Annotated new fragment, or the new input unchanged
    pub new_html: String,
    /// Route taken
    pub route: Route,
    /// Every state visited, in order
    pub states: Vec<CompareState>,
    /// Markers emitted over both sides
    pub markers: MarkerCounts,
    /// Path of the first marker (new side first), for scrolling into view
    pub first_change: Option<String>,
    /// Why the pass fell back to the original inputs
    pub failure: Option<DiffError>,
}

impl CompareOutcome {
    fn unchanged(old_html: &str, new_html: &str, route: Route, states: Vec<CompareState>) -> Self {
        Self {
            old_html: old_html.to_string(),
            new_html: new_html.to_string(),
            route,
            states,
            markers: MarkerCounts::default(),
            first_change: None,
            failure: None,
        }
    }

    /// Whether the pass failed and the outputs are the original inputs.
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }

    /// The last state visited. Always [`CompareState::Done`].
    pub fn final_state(&self) -> CompareState {
        self.states.last().copied().unwrap_or(CompareState::Idle)
    }
}

/// What a comparison renders to, depending on [`ViewMode`].
#[derive(Debug, Clone)]
pub enum Rendering {
    /// Two annotated fragments
    SideBySide(CompareOutcome),
    /// One merged fragment from a whole-document differ
    Inline(String),
}

struct Annotated {
    old_html: String,
    new_html: String,
    markers: MarkerCounts,
    first_change: Option<String>,
}

/// Compares two HTML snapshots.
///
/// Each call parses fresh trees; nothing is kept between calls.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    options: DiffOptions,
}

impl Comparator {
    /// A comparator with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A comparator with the given options.
    pub fn with_options(options: DiffOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Compare two fragments and annotate both.
    ///
    /// Never fails: any error or panic during the pass is reported in
    /// [`CompareOutcome::failure`] and both outputs are the inputs, untouched.
    pub fn compare(&self, old_html: &str, new_html: &str) -> CompareOutcome {
        let mut states = vec![CompareState::Idle, CompareState::Comparing];

        if old_html == new_html {
            debug!("inputs are byte-identical");
            states.push(CompareState::Done);
            return CompareOutcome::unchanged(old_html, new_html, Route::Unchanged, states);
        }

        let mut old_doc = parse(old_html);
        let mut new_doc = parse(new_html);
        let (Some(old_body), Some(new_body)) = (old_doc.body(), new_doc.body()) else {
            states.push(CompareState::Done);
            return self.fall_back(old_html, new_html, Route::Textual, states, DiffError::NoBody);
        };

        let same_text = old_doc.text_content(old_body) == new_doc.text_content(new_body);
        let route = if same_text {
            states.push(CompareState::StructuralOnly);
            Route::Structural
        } else {
            states.push(CompareState::TextualDiff);
            Route::Textual
        };
        debug!(?route, "route chosen");

        self.run_guarded(old_html, new_html, route, states, || {
            self.annotate(&mut old_doc, old_body, &mut new_doc, new_body, route)
        })
    }

    /// Run an annotation pass, turning its errors and panics into a fallback
    /// to the original inputs. Always ends in [`CompareState::Done`].
    fn run_guarded<F>(
        &self,
        old_html: &str,
        new_html: &str,
        route: Route,
        mut states: Vec<CompareState>,
        pass: F,
    ) -> CompareOutcome
    where
        F: FnOnce() -> Result<Annotated, DiffError>,
    {
        let result = catch_unwind(AssertUnwindSafe(pass)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DiffError::Panicked { message })
        });
        states.push(CompareState::Done);

        match result {
            Ok(annotated) => {
                debug!(markers = annotated.markers.total(), "comparison done");
                CompareOutcome {
                    old_html: annotated.old_html,
                    new_html: annotated.new_html,
                    route,
                    states,
                    markers: annotated.markers,
                    first_change: annotated.first_change,
                    failure: None,
                }
            }
            Err(err) => self.fall_back(old_html, new_html, route, states, err),
        }
    }

    fn fall_back(
        &self,
        old_html: &str,
        new_html: &str,
        route: Route,
        states: Vec<CompareState>,
        err: DiffError,
    ) -> CompareOutcome {
        debug!(%err, "comparison failed, showing inputs unchanged");
        let mut outcome = CompareOutcome::unchanged(old_html, new_html, route, states);
        outcome.failure = Some(err);
        outcome
    }

    fn annotate(
        &self,
        old_doc: &mut Document,
        old_body: NodeId,
        new_doc: &mut Document,
        new_body: NodeId,
        route: Route,
    ) -> Result<Annotated, DiffError> {
        let (markers, first_change) = {
            let mut old = Annotator::new(old_doc, Side::Old);
            let mut new = Annotator::new(new_doc, Side::New);

            match route {
                Route::Structural => {
                    align_documents(&mut old, old_body, &mut new, new_body, &self.options)?;
                    let min_run = self.options.whitespace_min_run;
                    old.highlight_whitespace_runs(old_body, min_run)?;
                    new.highlight_whitespace_runs(new_body, min_run)?;
                }
                Route::Textual => {
                    let old_text = old.doc().text_content(old_body);
                    let new_text = new.doc().text_content(new_body);
                    let ops = diff_words(&old_text, &new_text)?;
                    trace!(ops = ops.len(), "container word diff");
                    old.highlight_ops(old_body, &ops, false)?;
                    new.highlight_ops(new_body, &ops, false)?;
                }
                Route::Unchanged => {}
            }

            let mut markers = old.counts();
            markers.merge(&new.counts());
            let first_change = new
                .first_marker(new_body)
                .or_else(|| old.first_marker(old_body))
                .map(|path| path.to_string());
            (markers, first_change)
        };

        Ok(Annotated {
            old_html: serialize_children(old_doc, old_body, &self.options.serialize),
            new_html: serialize_children(new_doc, new_body, &self.options.serialize),
            markers,
            first_change,
        })
    }

    /// Merge both fragments into one through `differ`.
    ///
    /// Attributes in the editor's private namespace are stripped from both
    /// inputs first.
    pub fn compare_inline<D>(&self, old_html: &str, new_html: &str, differ: &D) -> String
    where
        D: WholeDocumentDiff + ?Sized,
    {
        let old = strip_private_attrs(old_html, &self.options);
        let new = strip_private_attrs(new_html, &self.options);
        debug!(old = old.len(), new = new.len(), "delegating inline diff");
        differ.diff(&old, &new)
    }

    /// Compare according to the configured [`ViewMode`].
    pub fn render<D>(&self, old_html: &str, new_html: &str, differ: &D) -> Rendering
    where
        D: WholeDocumentDiff + ?Sized,
    {
        match self.options.view_mode {
            ViewMode::SideBySide => Rendering::SideBySide(self.compare(old_html, new_html)),
            ViewMode::Inline => Rendering::Inline(self.compare_inline(old_html, new_html, differ)),
        }
    }
}
