//! Structural and word-level diff of two HTML snapshots.
//!
//! redraft provides:
//! - **Parsing**: html5ever tree construction into an indextree arena
//! - **Alignment**: greedy first-fit matching of elements across versions (via graft)
//! - **Word diff**: character diff refined to whole words, punctuation and whitespace
//! - **Annotation**: change markers spliced into both trees without touching
//!   surrounding formatting
//!
//! # Example
//!
//! ```rust
//! use redraft::{Comparator, CompareState};
//!
//! let outcome = Comparator::new().compare("<p>Hello world</p>", "<p>Hello there</p>");
//! assert_eq!(outcome.final_state(), CompareState::Done);
//! assert_eq!(
//!     outcome.old_html,
//!     r#"<p>Hello <span class="diff-removed">world</span></p>"#
//! );
//! assert_eq!(
//!     outcome.new_html,
//!     r#"<p>Hello <span class="diff-added">there</span></p>"#
//! );
//! ```

mod tracing_macros;

pub mod align;
pub mod compare;
pub mod dom;
pub mod error;
pub mod highlight;
pub mod index;
pub mod inline;
pub mod options;
pub mod serialize;
pub mod words;

pub use compare::{CompareOutcome, CompareState, Comparator, Rendering, Route};
pub use dom::{Document, ElementData, Namespace, NodeData, NodeKind, parse};
pub use error::DiffError;
pub use highlight::{ChangeClass, MarkerCounts};
pub use inline::{WholeDocumentDiff, strip_private_attrs};
pub use options::{DiffOptions, ViewMode};
pub use serialize::SerializeOptions;
pub use words::{DiffOp, Op, diff_words};

// Addresses are part of the public vocabulary
pub use graft::{AddressPath, Side};
