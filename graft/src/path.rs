use core::fmt;
use core::str::FromStr;
use smallvec::SmallVec;

/// Which of the two compared trees a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The tree before the change
    Old,
    /// The tree after the change
    New,
}

impl Side {
    /// The tag used as the first segment of a rendered [`AddressPath`].
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Old => "old",
            Side::New => "new",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered child indices from a tree root to a node, tagged with its side.
///
/// Renders as `old/0/2/1`. The root itself has no segments and renders as the
/// bare side tag. A path's parent is always a strict prefix of it.
///
/// Uses `SmallVec<[u32; 16]>` so that typical document depths never allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPath {
    side: Side,
    segments: SmallVec<[u32; 16]>,
}

impl AddressPath {
    /// The path of the root on `side`.
    pub fn root(side: Side) -> Self {
        Self {
            side,
            segments: SmallVec::new(),
        }
    }

    /// Build a path from raw segments.
    pub fn from_segments(side: Side, segments: &[u32]) -> Self {
        Self {
            side,
            segments: SmallVec::from_slice(segments),
        }
    }

    /// The side this path addresses.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Child indices from the root.
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend this path by one child index.
    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index);
        Self {
            side: self.side,
            segments,
        }
    }

    /// The parent path, or `None` for the root's direct children and the root.
    ///
    /// The root is never indexed, so direct children have no parent record.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            side: self.side,
            segments: SmallVec::from_slice(&self.segments[..self.segments.len() - 1]),
        })
    }

    /// Depth below the root: direct children are at depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &AddressPath) -> bool {
        self.side == other.side
            && self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for AddressPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.side.as_str())?;
        for idx in &self.segments {
            write!(f, "/{idx}")?;
        }
        Ok(())
    }
}

/// Error returned when a rendered path cannot be parsed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePathError(String);

impl fmt::Display for ParsePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address path: {}", self.0)
    }
}

impl core::error::Error for ParsePathError {}

impl FromStr for AddressPath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let side = match parts.next() {
            Some("old") => Side::Old,
            Some("new") => Side::New,
            _ => return Err(ParsePathError(s.to_owned())),
        };
        let mut segments = SmallVec::new();
        for part in parts {
            let idx = part.parse().map_err(|_| ParsePathError(s.to_owned()))?;
            segments.push(idx);
        }
        Ok(Self { side, segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn display_is_slash_joined_with_side_tag() {
        let path = AddressPath::root(Side::Old).child(0).child(2).child(1);
        assert_eq!(path.to_string(), "old/0/2/1");
        assert_eq!(AddressPath::root(Side::New).to_string(), "new");
    }

    #[test]
    fn parent_is_strict_prefix() {
        let path = AddressPath::from_segments(Side::New, &[3, 1, 4]);
        let parent = path.parent().unwrap();
        assert_eq!(parent.segments(), &[3, 1]);
        assert!(parent.is_ancestor_of(&path));
        assert!(!path.is_ancestor_of(&parent));
        assert!(!path.is_ancestor_of(&path));
    }

    #[test]
    fn top_level_nodes_have_no_parent_record() {
        let path = AddressPath::from_segments(Side::Old, &[0]);
        assert_eq!(path.parent(), None);
        assert_eq!(path.depth(), 0);
    }

    #[test]
    fn sides_never_nest() {
        let old = AddressPath::from_segments(Side::Old, &[0]);
        let new = AddressPath::from_segments(Side::New, &[0, 1]);
        assert!(!old.is_ancestor_of(&new));
    }

    #[test]
    fn parse_roundtrip() {
        let path: AddressPath = "new/0/12/3".parse().unwrap();
        assert_eq!(path.side(), Side::New);
        assert_eq!(path.segments(), &[0, 12, 3]);
        assert!("left/0".parse::<AddressPath>().is_err());
        assert!("old/x".parse::<AddressPath>().is_err());
    }
}
