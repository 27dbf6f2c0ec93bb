//! Schema hints consulted while coercing environment-variable keys.
//!
//! The schema is not a validation layer. The merge core only asks it two
//! questions: whether a path names a sequence (so envvar components under
//! it parse as indices) and whether a path is declared at all (for the
//! `only_schema_keys` filter).

use indexmap::IndexMap;

use crate::path::TreePath;

/// Declared shape of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Children are addressed by textual keys.
    Mapping,
    /// Children are addressed by integer indices.
    Sequence,
}

/// Kind of key expected under a given container path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Lower-cased textual key.
    Text,
    /// Parsed integer index.
    Index,
}

/// A sparse map of declared paths to their container kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaTree {
    nodes: IndexMap<TreePath, NodeKind>,
}

impl SchemaTree {
    /// An empty schema: every key is textual and nothing is declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the container kind at `path`. Paths are normalised to their
    /// rooted form. Re-declaring a path overwrites the previous kind.
    pub fn declare(&mut self, path: impl Into<TreePath>, kind: NodeKind) {
        self.nodes.insert(path.into().into_rooted(), kind);
    }

    /// The key kind expected for children of `container_path`.
    #[must_use]
    pub fn child_kind(&self, container_path: &TreePath) -> KeyKind {
        match self.nodes.get(container_path) {
            Some(NodeKind::Sequence) => KeyKind::Index,
            _ => KeyKind::Text,
        }
    }

    /// Whether `path` is declared, either exactly or as a prefix of a
    /// declared path.
    #[must_use]
    pub fn declares(&self, path: &TreePath) -> bool {
        self.nodes
            .keys()
            .any(|declared| declared == path || declared.starts_with(path))
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyKind, NodeKind, SchemaTree};
    use crate::path::TreePath;

    #[test]
    fn sequence_paths_expect_index_children() {
        let mut schema = SchemaTree::new();
        schema.declare("listy", NodeKind::Sequence);
        assert_eq!(
            schema.child_kind(&TreePath::from("root.listy")),
            KeyKind::Index
        );
        assert_eq!(
            schema.child_kind(&TreePath::from("root.dicty")),
            KeyKind::Text
        );
    }

    #[test]
    fn declares_matches_prefixes_of_declared_paths() {
        let mut schema = SchemaTree::new();
        schema.declare("dicty.x", NodeKind::Mapping);
        assert!(schema.declares(&TreePath::from("root.dicty")));
        assert!(schema.declares(&TreePath::from("root.dicty.x")));
        assert!(!schema.declares(&TreePath::from("root.other")));
    }
}
