//! The merge tree: a compiled program of per-path operations.

use indexmap::IndexMap;

use crate::path::TreePath;
use crate::token::Token;

use super::op::Operation;

/// Side-structure mapping tree paths to ordered operation lists, plus
/// container-scoped meta tokens that survive the build phase.
///
/// Both maps are append-only while building; the applicator consumes the
/// tree read-only. Every path is anchored at the synthetic `root`
/// component; dotted strings passed to the accessors are normalised the
/// same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeTree {
    operations: IndexMap<TreePath, Vec<Operation>>,
    meta_tokens: IndexMap<TreePath, Vec<Token>>,
}

impl MergeTree {
    /// An empty merge tree. Applying it leaves any base unchanged apart
    /// from rooting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The operations recorded at `path`, in insertion order.
    #[must_use]
    pub fn get(&self, path: &TreePath) -> Option<&[Operation]> {
        self.operations.get(path).map(Vec::as_slice)
    }

    /// Append `op` to the operation list at `path`.
    pub fn add(&mut self, path: impl Into<TreePath>, op: Operation) {
        self.operations
            .entry(path.into().into_rooted())
            .or_default()
            .push(op);
    }

    /// Append a meta token at `path`.
    pub fn add_meta_token(&mut self, path: impl Into<TreePath>, token: Token) {
        self.meta_tokens
            .entry(path.into().into_rooted())
            .or_default()
            .push(token);
    }

    /// The meta tokens recorded at `path`, in insertion order.
    #[must_use]
    pub fn meta_tokens(&self, path: &TreePath) -> &[Token] {
        self.meta_tokens.get(path).map_or(&[], Vec::as_slice)
    }

    /// The first meta token at `path` carrying `token_id`, if any.
    #[must_use]
    pub fn meta_token(&self, path: &TreePath, token_id: &str) -> Option<&Token> {
        self.meta_tokens(path)
            .iter()
            .find(|token| token.id() == token_id)
    }

    /// Whether the tree carries no operations and no meta tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.meta_tokens.is_empty()
    }

    /// Iterate `(path, operations)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TreePath, &[Operation])> {
        self.operations
            .iter()
            .map(|(path, ops)| (path, ops.as_slice()))
    }

    /// Collapse chains of single-`Merge` hops into `JumpMerge` shortcuts.
    ///
    /// A hop qualifies when the intermediate path holds exactly one
    /// operation (the next `Merge`) and no meta tokens. Chains shorter
    /// than two hops are left alone: a one-segment jump is just a `Merge`.
    /// Apply semantics are unchanged.
    pub fn compact(&mut self) {
        let paths: Vec<TreePath> = self.operations.keys().cloned().collect();
        for path in paths {
            if !self.operations.contains_key(&path) {
                continue;
            }
            let op_count = self.operations.get(&path).map_or(0, Vec::len);
            for position in 0..op_count {
                let Some(Operation::Merge { key }) =
                    self.operations.get(&path).and_then(|ops| ops.get(position))
                else {
                    continue;
                };

                let mut relative = TreePath::new(vec![key.clone()]);
                let mut cursor = path.join(key.clone());
                let mut bypassed: Vec<TreePath> = Vec::new();
                loop {
                    let Some(ops) = self.operations.get(&cursor) else {
                        break;
                    };
                    let [Operation::Merge { key: next_key }] = ops.as_slice() else {
                        break;
                    };
                    if !self.meta_tokens(&cursor).is_empty() {
                        break;
                    }
                    relative = relative.join(next_key.clone());
                    bypassed.push(cursor.clone());
                    cursor = cursor.join(next_key.clone());
                }

                if relative.len() < 2 {
                    continue;
                }
                if let Some(ops) = self.operations.get_mut(&path) {
                    ops[position] = Operation::JumpMerge { path: relative };
                }
                for stale in bypassed {
                    self.operations.shift_remove(&stale);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MergeTree;
    use crate::merge::Operation;
    use crate::path::{PathSegment, TreePath};
    use crate::value::Value;

    #[test]
    fn operations_keep_insertion_order() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Append { value: Value::Int(1) });
        tree.add("root", Operation::Append { value: Value::Int(2) });
        let ops = tree.get(&TreePath::root()).expect("recorded");
        assert_eq!(
            ops,
            &[
                Operation::Append { value: Value::Int(1) },
                Operation::Append { value: Value::Int(2) },
            ]
        );
    }

    #[test]
    fn paths_are_normalised_to_rooted_form() {
        let mut tree = MergeTree::new();
        tree.add("nested", Operation::Append { value: Value::Int(1) });
        assert!(tree.get(&TreePath::from("root.nested")).is_some());
    }

    #[test]
    fn compact_collapses_single_merge_chains() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("a") });
        tree.add("root.a", Operation::Merge { key: PathSegment::key("b") });
        tree.add(
            "root.a.b",
            Operation::Replace {
                key: PathSegment::key("foo"),
                value: Value::Int(999),
            },
        );
        tree.compact();

        let mut expected = MergeTree::new();
        expected.add(
            "root",
            Operation::JumpMerge {
                path: TreePath::from("a.b"),
            },
        );
        expected.add(
            "root.a.b",
            Operation::Replace {
                key: PathSegment::key("foo"),
                value: Value::Int(999),
            },
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn compact_leaves_branching_paths_alone() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("a") });
        tree.add("root.a", Operation::Merge { key: PathSegment::key("b") });
        tree.add(
            "root.a",
            Operation::Add {
                key: PathSegment::key("extra"),
                value: Value::Int(1),
            },
        );
        let before = tree.clone();
        tree.compact();
        assert_eq!(tree, before);
    }
}
