//! Applying a compiled merge tree to a base tree.

use crate::error::StrataError;
use crate::path::{PathSegment, TreePath, ROOT_KEY};
use crate::result_ext::StrataResultExt;
use crate::value::{ensure_rooted, Value};
use crate::StrataResult;

use super::op::Operation;
use super::tree::MergeTree;

/// Apply `merge_tree` to a copy of `base`, returning the merged rooted
/// tree. `base` itself is never mutated.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use strata_config::{MergeTree, Value, apply_merge_tree};
///
/// let base = Value::from(json!({"root": {"foo": 1}}));
/// let merged = apply_merge_tree(&base, &MergeTree::new()).expect("empty tree");
/// assert_eq!(merged, base);
/// ```
///
/// # Errors
///
/// Structural type errors abort the apply; gated operations no-op
/// silently.
pub fn apply_merge_tree(base: &Value, merge_tree: &MergeTree) -> StrataResult<Value> {
    let mut merged = base.clone();
    apply_merge_tree_in_place(&mut merged, merge_tree)?;
    Ok(merged)
}

/// Apply `merge_tree` to `base` in place, rooting it first.
///
/// Callers wanting atomicity use [`apply_merge_tree`] instead: an error
/// raised mid-apply may leave `base` partially merged.
///
/// # Errors
///
/// Structural type errors abort the apply; gated operations no-op
/// silently.
pub fn apply_merge_tree_in_place(base: &mut Value, merge_tree: &MergeTree) -> StrataResult<()> {
    let owned = std::mem::take(base);
    *base = ensure_rooted(owned);
    let root_path = TreePath::root();
    let Some(root_child) = base.get_mut(&PathSegment::key(ROOT_KEY)) else {
        return Err(StrataError::type_mismatch("rooted tree lost its root entry")).arc_err();
    };
    step_in(root_child, &root_path, merge_tree)
}

/// Recursive driver: run the operations recorded for `path` against
/// `container`, in insertion order. Routing markers descend; primitive
/// operations mutate.
fn step_in(container: &mut Value, path: &TreePath, merge_tree: &MergeTree) -> StrataResult<()> {
    let Some(ops) = merge_tree.get(path) else {
        return Ok(());
    };
    for op in ops {
        match op {
            Operation::Merge { key } => {
                match container.get_mut(key) {
                    Some(child) if child.is_container() => {
                        step_in(child, &path.join(key.clone()), merge_tree)?;
                    }
                    Some(terminal) => {
                        return Err(StrataError::type_mismatch(format!(
                            "merge target '{}' at {path} is a {}",
                            key,
                            terminal.kind_name()
                        )))
                        .arc_err();
                    }
                    // Missing intermediates are skipped silently.
                    None => {
                        tracing::trace!(%path, key = %key, "merge hop target missing, skipping");
                    }
                }
            }
            Operation::JumpMerge { path: relative } => {
                if let Some(target) = jump_to(container, relative, path)? {
                    step_in(target, &path.concat(relative), merge_tree)?;
                } else {
                    tracing::trace!(%path, jump = %relative, "jump hop target missing, skipping");
                }
            }
            primitive => primitive.apply_to(container)?,
        }
    }
    Ok(())
}

/// Follow a relative path through nested containers.
///
/// Returns `Ok(None)` when a hop is missing (silent skip) and a type
/// error when a hop lands on a terminal or the segment kind does not
/// match the container kind.
fn jump_to<'tree>(
    container: &'tree mut Value,
    relative: &TreePath,
    at: &TreePath,
) -> StrataResult<Option<&'tree mut Value>> {
    let mut cursor = container;
    for segment in relative.segments() {
        if !cursor.is_container() {
            return Err(StrataError::type_mismatch(format!(
                "jump hop '{segment}' under {at} lands on a {}",
                cursor.kind_name()
            )))
            .arc_err();
        }
        match (&*cursor, segment) {
            (Value::Map(_), PathSegment::Key(_)) | (Value::Seq(_), PathSegment::Index(_)) => {}
            _ => {
                return Err(StrataError::type_mismatch(format!(
                    "jump segment '{segment}' does not match the container kind under {at}"
                )))
                .arc_err();
            }
        }
        match cursor.get_mut(segment) {
            Some(next) => cursor = next,
            None => return Ok(None),
        }
    }
    Ok(Some(cursor))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{apply_merge_tree, apply_merge_tree_in_place};
    use crate::error::StrataError;
    use crate::merge::{MergeTree, Operation};
    use crate::path::{PathSegment, TreePath};
    use crate::value::{ensure_rooted, Value};

    #[test]
    fn empty_tree_only_roots_the_base() {
        let base = Value::from(json!({"foo": 1}));
        let merged = apply_merge_tree(&base, &MergeTree::new()).expect("no ops");
        assert_eq!(merged, ensure_rooted(base));
    }

    #[test]
    fn the_copying_entrypoint_never_mutates_the_base() {
        let base = Value::from(json!({"root": {"listy": [1]}}));
        let snapshot = base.clone();
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("listy") });
        tree.add("root.listy", Operation::Append { value: Value::Int(2) });
        let merged = apply_merge_tree(&base, &tree).expect("applies");
        assert_eq!(base, snapshot);
        assert_eq!(merged, Value::from(json!({"root": {"listy": [1, 2]}})));
    }

    #[test]
    fn operations_fire_in_insertion_order() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("listy") });
        tree.add("root.listy", Operation::Add { key: PathSegment::Index(0), value: Value::Int(999) });
        tree.add("root.listy", Operation::Append { value: Value::from("appended") });
        tree.add("root.listy", Operation::AppendUnique { value: Value::Int(2) });
        tree.add("root.listy", Operation::AppendUnique { value: Value::Int(3) });
        tree.add("root.listy", Operation::AppendUnique { value: Value::Int(4) });

        let base = Value::from(json!({"root": {"listy": [1, 2, 3]}}));
        let merged = apply_merge_tree(&base, &tree).expect("applies");
        assert_eq!(
            merged,
            Value::from(json!({"root": {"listy": [1, 2, 3, "appended", 4]}}))
        );
    }

    #[test]
    fn replace_swaps_whole_subtrees() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Add { key: PathSegment::key("value_c"), value: Value::Int(999) });
        tree.add(
            "root",
            Operation::Replace {
                key: PathSegment::key("nested"),
                value: Value::from(json!({"something": "else"})),
            },
        );
        let base = Value::from(json!({
            "root": {"value_a": 111, "nested": {"foo": 333, "bar": 444}},
        }));
        let merged = apply_merge_tree(&base, &tree).expect("applies");
        assert_eq!(
            merged,
            Value::from(json!({
                "root": {"value_a": 111, "nested": {"something": "else"}, "value_c": 999},
            }))
        );
    }

    #[test]
    fn jump_merge_shortcuts_nested_chains() {
        let mut tree = MergeTree::new();
        tree.add(
            "root",
            Operation::JumpMerge {
                path: TreePath::from("level-1.0.level-2.level-3"),
            },
        );
        tree.add(
            "root.level-1.0.level-2.level-3",
            Operation::Replace { key: PathSegment::key("foo"), value: Value::Int(999) },
        );
        tree.add(
            "root.level-1.0.level-2.level-3",
            Operation::Add { key: PathSegment::key("new"), value: Value::Int(54321) },
        );
        let base = Value::from(json!({
            "root": {"level-1": [{"level-2": {"level-3": {"foo": 111}}}]},
        }));
        let merged = apply_merge_tree(&base, &tree).expect("applies");
        assert_eq!(
            merged,
            Value::from(json!({
                "root": {"level-1": [{"level-2": {"level-3": {"foo": 999, "new": 54321}}}]},
            }))
        );
    }

    #[test]
    fn missing_merge_hops_are_silent() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("ghost") });
        tree.add("root.ghost", Operation::Append { value: Value::Int(1) });
        let base = Value::from(json!({"root": {"foo": 1}}));
        let merged = apply_merge_tree(&base, &tree).expect("applies");
        assert_eq!(merged, base);
    }

    #[test]
    fn merge_into_a_terminal_is_a_type_error() {
        let mut tree = MergeTree::new();
        tree.add("root", Operation::Merge { key: PathSegment::key("foo") });
        let base = Value::from(json!({"root": {"foo": 1}}));
        let err = apply_merge_tree(&base, &tree).expect_err("must fail");
        assert!(matches!(&*err, StrataError::TypeMismatch { .. }));
    }

    #[test]
    fn in_place_apply_roots_the_base() {
        let mut base = Value::from(json!({"foo": 1}));
        apply_merge_tree_in_place(&mut base, &MergeTree::new()).expect("no ops");
        assert_eq!(base, Value::from(json!({"root": {"foo": 1}})));
    }
}
