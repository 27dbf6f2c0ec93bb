//! Immutable tree paths and their components.

use std::fmt;

/// Name of the synthetic component every rooted path starts with.
pub const ROOT_KEY: &str = "root";

/// One component of a [`TreePath`]: a textual mapping key or a sequence
/// index. The two kinds are distinct; `Key("0")` and `Index(0)` never
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Textual mapping key.
    Key(String),
    /// Non-negative sequence index.
    Index(usize),
}

impl PathSegment {
    /// Construct a textual key segment.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    /// Parse a dotted-form component: integer-looking text becomes an
    /// [`PathSegment::Index`], anything else a [`PathSegment::Key`].
    #[must_use]
    pub fn parse_component(component: &str) -> Self {
        component
            .parse::<usize>()
            .map_or_else(|_| Self::Key(component.to_owned()), Self::Index)
    }

    /// Borrow the textual key, if this is a key segment.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(name) => Some(name.as_str()),
            Self::Index(_) => None,
        }
    }

    /// The index value, if this is an index segment.
    #[must_use]
    pub const fn as_index(&self) -> Option<usize> {
        match self {
            Self::Key(_) => None,
            Self::Index(idx) => Some(*idx),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(name) => f.write_str(name),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(component: &str) -> Self {
        Self::parse_component(component)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An immutable, ordered sequence of path components.
///
/// Merge-tree paths always start with the synthetic `root` component;
/// relative paths (as carried by jump operations) do not. Concatenation
/// never mutates: [`TreePath::join`] and [`TreePath::concat`] return new
/// paths.
///
/// The dotted string form is accepted at boundaries and converted
/// componentwise; integer-looking components become indices.
///
/// # Examples
///
/// ```rust
/// use strata_config::TreePath;
///
/// let path = TreePath::root().join("listy").join(0usize);
/// assert_eq!(path.to_string(), "root.listy.0");
/// assert_eq!(TreePath::from("root.listy.0"), path);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TreePath {
    segments: Vec<PathSegment>,
}

impl TreePath {
    /// The rooted empty path: just the synthetic `root` component.
    #[must_use]
    pub fn root() -> Self {
        Self {
            segments: vec![PathSegment::key(ROOT_KEY)],
        }
    }

    /// Build a path from components.
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a dotted string into a (possibly relative) path.
    #[must_use]
    pub fn parse_dotted(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::default();
        }
        Self {
            segments: dotted.split('.').map(PathSegment::parse_component).collect(),
        }
    }

    /// A new path with `segment` appended.
    #[must_use]
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// A new path with every component of `tail` appended.
    #[must_use]
    pub fn concat(&self, tail: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(tail.segments.iter().cloned());
        Self { segments }
    }

    /// The components, in order.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether this path is anchored at the synthetic `root` component.
    #[must_use]
    pub fn is_rooted(&self) -> bool {
        matches!(self.segments.first(), Some(PathSegment::Key(k)) if k == ROOT_KEY)
    }

    /// A rooted copy: the path itself when already rooted, otherwise the
    /// same components prefixed with `root`.
    #[must_use]
    pub fn into_rooted(self) -> Self {
        if self.is_rooted() {
            return self;
        }
        let mut segments = vec![PathSegment::key(ROOT_KEY)];
        segments.extend(self.segments);
        Self { segments }
    }

    /// Whether `prefix` is a leading run of this path's components.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for TreePath {
    fn from(dotted: &str) -> Self {
        Self::parse_dotted(dotted)
    }
}

impl FromIterator<PathSegment> for TreePath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}
