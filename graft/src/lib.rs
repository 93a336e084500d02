//! # Graft
//!
//! Greedy first-fit alignment of two trees by structural signature and content.
//!
//! Graft pairs the nodes of an "old" tree with the nodes of a "new" tree without
//! attempting a minimal tree edit distance. It is deliberately heuristic: the
//! result depends on traversal order, and that order is fixed so that the same
//! inputs always produce the same alignment.
//!
//! ## Algorithm Overview
//!
//! Nodes of both trees are visited by ascending depth (ties broken by pre-order
//! position), so ancestors are always considered before their descendants.
//!
//! 1. **Exact pass**: pair the first candidate with an equal signature *and* equal
//!    content. Both nodes become *decided*.
//! 2. **Structural pass**: pair the first candidate with an equal signature. A
//!    [`Judge`] tells whether the pair really changed (both become decided) or
//!    only differs in insignificant ways (paired, but descendants stay eligible).
//! 3. **Residual pass**: every old node still unpaired is removed, every new node
//!    still unpaired is added.
//!
//! A node whose ancestor is decided is never considered again: the ancestor's
//! decision covers the whole subtree.
//!
//! ## Usage
//!
//! ```
//! use graft::{AlignTree, Classification, Verdict, align};
//!
//! struct Flat(Vec<(&'static str, &'static str)>);
//!
//! impl AlignTree for Flat {
//!     fn len(&self) -> usize { self.0.len() }
//!     fn depth(&self, _idx: usize) -> usize { 0 }
//!     fn parent(&self, _idx: usize) -> Option<usize> { None }
//!     fn signature(&self, idx: usize) -> &str { self.0[idx].0 }
//!     fn content(&self, idx: usize) -> &str { self.0[idx].1 }
//! }
//!
//! let old = Flat(vec![("p", "hello"), ("h1", "title")]);
//! let new = Flat(vec![("p", "hello")]);
//!
//! let alignment = align(&old, &new, |_, _| Ok::<_, ()>(Verdict::Changed)).unwrap();
//! assert_eq!(alignment.old_class(0), Classification::Identical);
//! assert_eq!(alignment.old_class(1), Classification::Removed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

mod tracing_macros;

/// The three alignment passes
pub mod align;
/// Addresses of nodes within one side of a comparison
pub mod path;

pub use align::{AlignTree, Alignment, Classification, Judge, Pair, PairKind, Verdict, align};
pub use path::{AddressPath, ParsePathError, Side};
