use facet::Facet;

use crate::serialize::SerializeOptions;

/// How the caller presents a comparison.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ViewMode {
    /// Two annotated fragments, one per side
    #[default]
    SideBySide,
    /// One merged fragment produced by a whole-document differ
    Inline,
}

/// Configuration for a [`crate::Comparator`].
#[derive(Clone, Debug)]
pub struct DiffOptions {
    /// Presentation mode (default: side by side)
    pub view_mode: ViewMode,

    /// Attribute name prefixes reserved by the hosting editor. Such attributes
    /// are left out of structural signatures and stripped before inline diffing.
    pub private_attr_prefixes: Vec<String>,

    /// Shortest run of consecutive spaces the whitespace highlighter marks (default: 2)
    pub whitespace_min_run: usize,

    /// How annotated trees are serialized
    pub serialize: SerializeOptions,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::SideBySide,
            private_attr_prefixes: vec!["data-lexical-".to_string()],
            whitespace_min_run: 2,
            serialize: SerializeOptions::default(),
        }
    }
}

impl DiffOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the presentation mode.
    pub fn view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = mode;
        self
    }

    /// Replace the private attribute prefixes.
    pub fn private_attr_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private_attr_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the shortest whitespace run worth marking. Clamped to at least 1.
    pub fn whitespace_min_run(mut self, run: usize) -> Self {
        self.whitespace_min_run = run.max(1);
        self
    }

    /// Set the serialization options for annotated output.
    pub fn serialize_options(mut self, opts: SerializeOptions) -> Self {
        self.serialize = opts;
        self
    }

    /// Whether `name` belongs to the hosting editor's private namespace.
    pub fn is_private_attr(&self, name: &str) -> bool {
        self.private_attr_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}
