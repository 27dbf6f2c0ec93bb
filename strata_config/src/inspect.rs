//! Read-only path queries against rooted trees.
//!
//! Unlike the applicator, which silently skips missing hops, the query
//! surface reports missing or mismatched paths as [`PathNotFound`].
//!
//! [`PathNotFound`]: crate::StrataError::PathNotFound

use crate::error::StrataError;
use crate::path::TreePath;
use crate::result_ext::StrataResultExt;
use crate::value::Value;
use crate::StrataResult;

/// Resolve `path` against `tree`.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use strata_config::{TreePath, Value, get_path};
///
/// let tree = Value::from(json!({"root": {"dicty": {"x": 1}}}));
/// let found = get_path(&tree, &TreePath::from("root.dicty.x")).expect("present");
/// assert_eq!(found, &Value::Int(1));
/// ```
///
/// # Errors
///
/// Returns [`StrataError::PathNotFound`] when a component is missing or
/// its kind does not match the container it addresses.
pub fn get_path<'tree>(tree: &'tree Value, path: &TreePath) -> StrataResult<&'tree Value> {
    let mut cursor = tree;
    for segment in path.segments() {
        cursor = cursor
            .get(segment)
            .ok_or_else(|| StrataError::PathNotFound {
                path: path.to_string(),
            })
            .arc_err()?;
    }
    Ok(cursor)
}

/// Resolve a dotted path against `tree`, rooting the path first so
/// callers may write `"dicty.x"` as well as `"root.dicty.x"`.
///
/// # Errors
///
/// Returns [`StrataError::PathNotFound`] when the path does not resolve.
pub fn get_dotted<'tree>(tree: &'tree Value, dotted: &str) -> StrataResult<&'tree Value> {
    get_path(tree, &TreePath::parse_dotted(dotted).into_rooted())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{get_dotted, get_path};
    use crate::error::StrataError;
    use crate::path::TreePath;
    use crate::value::Value;

    fn sample() -> Value {
        Value::from(json!({"root": {"dicty": {"x": 1}, "listy": ["a", "b"]}}))
    }

    #[test]
    fn resolves_keys_and_indices() {
        let tree = sample();
        assert_eq!(
            get_path(&tree, &TreePath::from("root.listy.1")).expect("present"),
            &Value::from("b")
        );
    }

    #[test]
    fn dotted_lookup_roots_relative_paths() {
        let tree = sample();
        assert_eq!(
            get_dotted(&tree, "dicty.x").expect("present"),
            &Value::Int(1)
        );
        assert_eq!(
            get_dotted(&tree, "root.dicty.x").expect("present"),
            &Value::Int(1)
        );
    }

    #[test]
    fn missing_paths_are_reported() {
        let tree = sample();
        let err = get_dotted(&tree, "dicty.y").expect_err("must fail");
        assert!(
            matches!(&*err, StrataError::PathNotFound { path } if path == "root.dicty.y")
        );
    }

    #[test]
    fn mismatched_segment_kinds_are_reported() {
        let tree = sample();
        // `0` parses as an index, which does not address a mapping.
        assert!(get_dotted(&tree, "dicty.0").is_err());
    }
}
