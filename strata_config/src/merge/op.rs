//! Concrete merge operations and their match-case gating.

use crate::error::StrataError;
use crate::path::{PathSegment, TreePath};
use crate::result_ext::StrataResultExt;
use crate::value::Value;
use crate::StrataResult;

/// Discriminant of an [`Operation`], as carried by operation tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Insert a missing entry.
    Add,
    /// Overwrite an existing entry.
    Replace,
    /// Push at the end of a sequence.
    Append,
    /// Push at the end of a sequence unless already present.
    AppendUnique,
    /// Routing marker: descend into a child container.
    Merge,
    /// Routing marker: descend through a dotted relative path.
    JumpMerge,
}

/// The membership relation between an operation's key and the target
/// container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCase {
    /// The key exists in both base and income.
    Conflict,
    /// Only the income carries the key.
    IncomeOnly,
    /// Only the base carries the key. Reserved: no operation reacts to it.
    BaseOnly,
}

/// One unit of merge intent attached to a path in the merge tree.
///
/// Every operation names a target `key` within the container its path
/// resolves to (position-agnostic operations carry none) and a payload
/// value where one applies. `Merge` and `JumpMerge` are routing markers:
/// they mutate nothing themselves and instead tell the applicator to
/// descend.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert `value` under `key`; silently skipped when the key already
    /// exists.
    Add {
        /// Target key or index.
        key: PathSegment,
        /// Payload.
        value: Value,
    },
    /// Overwrite `key` with `value`; silently skipped when the key is
    /// absent.
    Replace {
        /// Target key or index.
        key: PathSegment,
        /// Payload.
        value: Value,
    },
    /// Push `value` at the end of the target sequence.
    Append {
        /// Payload.
        value: Value,
    },
    /// Push `value` unless an equal element is already present.
    AppendUnique {
        /// Payload.
        value: Value,
    },
    /// Descend into the child container at `key`.
    Merge {
        /// Child to descend into.
        key: PathSegment,
    },
    /// Descend through `path`, a dotted relative chain of keys and
    /// indices, collapsing several single-`Merge` hops into one.
    JumpMerge {
        /// Relative path (never rooted).
        path: TreePath,
    },
}

impl Operation {
    /// The operation's discriminant.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::Add { .. } => OpKind::Add,
            Self::Replace { .. } => OpKind::Replace,
            Self::Append { .. } => OpKind::Append,
            Self::AppendUnique { .. } => OpKind::AppendUnique,
            Self::Merge { .. } => OpKind::Merge,
            Self::JumpMerge { .. } => OpKind::JumpMerge,
        }
    }

    /// The target key, when the operation addresses one.
    #[must_use]
    pub const fn key(&self) -> Option<&PathSegment> {
        match self {
            Self::Add { key, .. } | Self::Replace { key, .. } | Self::Merge { key } => Some(key),
            Self::Append { .. } | Self::AppendUnique { .. } | Self::JumpMerge { .. } => None,
        }
    }

    /// The match cases under which this operation runs. Outside of them it
    /// is a silent no-op.
    #[must_use]
    pub const fn allowed_match_cases(&self) -> &'static [MatchCase] {
        match self {
            Self::Add { .. } => &[MatchCase::IncomeOnly],
            Self::Replace { .. } | Self::Merge { .. } | Self::JumpMerge { .. } => {
                &[MatchCase::Conflict]
            }
            Self::Append { .. } | Self::AppendUnique { .. } => {
                &[MatchCase::Conflict, MatchCase::IncomeOnly]
            }
        }
    }

    /// Compute the match case of this operation's key against `container`.
    ///
    /// A missing key (position-agnostic operations) is treated as
    /// [`MatchCase::Conflict`] so the operation always runs.
    ///
    /// # Errors
    ///
    /// [`StrataError::TypeMismatch`] when the key kind and the container
    /// kind disagree: an index against a mapping, a textual key against a
    /// sequence, or a terminal target.
    pub fn match_case(&self, container: &Value) -> StrataResult<MatchCase> {
        let Some(key) = self.key() else {
            return Ok(MatchCase::Conflict);
        };
        match (container, key) {
            (Value::Map(map), PathSegment::Key(name)) => Ok(if map.contains_key(name.as_str()) {
                MatchCase::Conflict
            } else {
                MatchCase::IncomeOnly
            }),
            (Value::Seq(seq), PathSegment::Index(idx)) => Ok(if *idx < seq.len() {
                MatchCase::Conflict
            } else {
                MatchCase::IncomeOnly
            }),
            (Value::Map(_), PathSegment::Index(idx)) => Err(StrataError::type_mismatch(format!(
                "integer key {idx} against a mapping"
            )))
            .arc_err(),
            (Value::Seq(_), PathSegment::Key(name)) => Err(StrataError::type_mismatch(format!(
                "textual key {name:?} against a sequence"
            )))
            .arc_err(),
            (other, _) => Err(StrataError::type_mismatch(format!(
                "operation target is a {}, expected a container",
                other.kind_name()
            )))
            .arc_err(),
        }
    }

    /// Run the operation against `container`, mutating it in place.
    ///
    /// A disallowed match case is a silent no-op. Routing markers
    /// (`Merge`, `JumpMerge`) mutate nothing; the applicator interprets
    /// them before dispatch ever reaches this method.
    ///
    /// # Errors
    ///
    /// [`StrataError::TypeMismatch`] when the operation is incompatible
    /// with the container kind, for example `Append` against a mapping.
    pub fn apply_to(&self, container: &mut Value) -> StrataResult<()> {
        let case = self.match_case(container)?;
        if !self.allowed_match_cases().contains(&case) {
            tracing::trace!(op = ?self.kind(), ?case, "operation gated off, skipping");
            return Ok(());
        }
        match self {
            Self::Add { key, value } => insert_new(container, key, value),
            Self::Replace { key, value } => overwrite(container, key, value),
            Self::Append { value } => push(container, value, false),
            Self::AppendUnique { value } => push(container, value, true),
            Self::Merge { .. } | Self::JumpMerge { .. } => Ok(()),
        }
    }
}

/// `Add` dispatch: the key is known to be absent (income-only gate).
fn insert_new(container: &mut Value, key: &PathSegment, value: &Value) -> StrataResult<()> {
    match (container, key) {
        (Value::Map(map), PathSegment::Key(name)) => {
            map.insert(name.clone(), value.clone());
            Ok(())
        }
        (Value::Seq(seq), PathSegment::Index(idx)) => {
            if *idx == seq.len() {
                seq.push(value.clone());
                Ok(())
            } else {
                Err(StrataError::type_mismatch(format!(
                    "cannot add at index {idx} in a sequence of length {}",
                    seq.len()
                )))
                .arc_err()
            }
        }
        _ => unreachable_kind(),
    }
}

/// `Replace` dispatch: the key is known to be present (conflict gate).
fn overwrite(container: &mut Value, key: &PathSegment, value: &Value) -> StrataResult<()> {
    match (container, key) {
        (Value::Map(map), PathSegment::Key(name)) => {
            map.insert(name.clone(), value.clone());
            Ok(())
        }
        (Value::Seq(seq), PathSegment::Index(idx)) => {
            if let Some(slot) = seq.get_mut(*idx) {
                *slot = value.clone();
            }
            Ok(())
        }
        _ => unreachable_kind(),
    }
}

fn push(container: &mut Value, value: &Value, unique: bool) -> StrataResult<()> {
    match container {
        Value::Seq(seq) => {
            if !(unique && seq.contains(value)) {
                seq.push(value.clone());
            }
            Ok(())
        }
        other => Err(StrataError::type_mismatch(format!(
            "append is sequence-only, got a {}",
            other.kind_name()
        )))
        .arc_err(),
    }
}

/// `match_case` already rejected mismatched kinds; reaching this arm means
/// gating and dispatch fell out of sync.
fn unreachable_kind() -> StrataResult<()> {
    Err(StrataError::type_mismatch(
        "operation dispatched against a container kind its gate rejected",
    ))
    .arc_err()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MatchCase, Operation};
    use crate::error::StrataError;
    use crate::path::PathSegment;
    use crate::value::Value;

    fn mapping() -> Value {
        Value::from(json!({"key_a": 111}))
    }

    #[test]
    fn add_noops_on_conflict_and_inserts_when_absent() {
        let mut target = mapping();
        let conflicting = Operation::Add {
            key: PathSegment::key("key_a"),
            value: Value::Int(999),
        };
        conflicting.apply_to(&mut target).expect("gated, no error");
        assert_eq!(target, mapping());

        let fresh = Operation::Add {
            key: PathSegment::key("key_b"),
            value: Value::Int(999),
        };
        fresh.apply_to(&mut target).expect("insert succeeds");
        fresh.apply_to(&mut target).expect("second run gated");
        assert_eq!(target, Value::from(json!({"key_a": 111, "key_b": 999})));
    }

    #[test]
    fn replace_noops_when_key_is_absent() {
        let mut target = mapping();
        let missing = Operation::Replace {
            key: PathSegment::key("key_b"),
            value: Value::Int(999),
        };
        missing.apply_to(&mut target).expect("gated, no error");
        assert_eq!(target, mapping());

        let present = Operation::Replace {
            key: PathSegment::key("key_a"),
            value: Value::Int(999),
        };
        present.apply_to(&mut target).expect("overwrite succeeds");
        present.apply_to(&mut target).expect("idempotent");
        assert_eq!(target, Value::from(json!({"key_a": 999})));
    }

    #[test]
    fn append_unique_twice_equals_once() {
        let mut target = Value::from(json!([1, 2, 3]));
        let op = Operation::AppendUnique {
            value: Value::Int(4),
        };
        op.apply_to(&mut target).expect("push succeeds");
        op.apply_to(&mut target).expect("duplicate skipped");
        assert_eq!(target, Value::from(json!([1, 2, 3, 4])));
    }

    #[test]
    fn append_unique_uses_structural_equality() {
        let mut target = Value::from(json!([{"foo": "bar"}]));
        let duplicate = Operation::AppendUnique {
            value: Value::from(json!({"foo": "bar"})),
        };
        duplicate.apply_to(&mut target).expect("skip");
        let different = Operation::AppendUnique {
            value: Value::from(json!({"foo": "different"})),
        };
        different.apply_to(&mut target).expect("push");
        assert_eq!(
            target,
            Value::from(json!([{"foo": "bar"}, {"foo": "different"}]))
        );
    }

    #[test]
    fn append_on_a_mapping_is_a_type_error() {
        let mut target = mapping();
        let op = Operation::Append {
            value: Value::Int(1),
        };
        let err = op.apply_to(&mut target).expect_err("must fail");
        assert!(matches!(&*err, StrataError::TypeMismatch { .. }));
    }

    #[test]
    fn null_keys_always_count_as_conflict() {
        let op = Operation::Append {
            value: Value::Int(1),
        };
        let seq = Value::from(json!([]));
        assert_eq!(op.match_case(&seq).expect("ok"), MatchCase::Conflict);
    }

    #[test]
    fn blurred_key_kinds_are_type_errors() {
        let op = Operation::Replace {
            key: PathSegment::Index(0),
            value: Value::Int(1),
        };
        let err = op.match_case(&mapping()).expect_err("must fail");
        assert!(matches!(&*err, StrataError::TypeMismatch { .. }));
    }
}
