//! Compiling an incoming tree into a merge tree.

use crate::error::StrataError;
use crate::path::{PathSegment, TreePath, ROOT_KEY};
use crate::result_ext::StrataResultExt;
use crate::token::{Token, TokenAction, TokenRegistry, tokenize};
use crate::value::Value;
use crate::StrataResult;

use super::op::{OpKind, Operation};
use super::policy::{MergePolicyRegistry, RuleAttrs};
use super::tree::MergeTree;

/// Attributes of an inline token rule: item-scoped, one-off, dynamic.
const TOKEN_RULE: RuleAttrs = RuleAttrs::new(false, false, false);

/// Attributes of a container-level marker rule: container-scoped and
/// propagating to every sibling, still declared dynamically.
const MARKER_RULE: RuleAttrs = RuleAttrs::new(true, true, false);

/// Compile `data` into a [`MergeTree`].
///
/// The incoming tree is walked in pre-order. Containers emit a `Merge`
/// routing marker and recurse; terminals are tokenized and folded, and the
/// effective operation for each terminal is selected with precedence
/// inline token > container-level marker > default `Replace`, consulting
/// `policy` whenever more than one candidate applies.
///
/// The result is deterministic for a given registry and policy, and `data`
/// is never mutated.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use strata_config::{
///     MergePolicyRegistry, TokenRegistry, Value, apply_merge_tree, create_merge_tree,
/// };
///
/// let registry = TokenRegistry::new();
/// let policy = MergePolicyRegistry::new();
/// let income = Value::from(json!({"key_a": "@add @int 999", "key_b": 999}));
/// let tree = create_merge_tree(&income, &registry, &policy).expect("well-formed income");
///
/// let base = Value::from(json!({"root": {"key_a": 111, "key_b": 222, "key_c": 111}}));
/// let merged = apply_merge_tree(&base, &tree).expect("compatible");
/// // `add` is a no-op on conflict; the default replace wins on key_b.
/// assert_eq!(
///     merged,
///     Value::from(json!({"root": {"key_a": 111, "key_b": 999, "key_c": 111}}))
/// );
/// ```
///
/// # Errors
///
/// Malformed token strings, unknown identifiers and a non-container root
/// are all fatal at build time.
pub fn create_merge_tree(
    data: &Value,
    registry: &TokenRegistry,
    policy: &MergePolicyRegistry,
) -> StrataResult<MergeTree> {
    let root_container = match data {
        Value::Map(map) if map.contains_key(ROOT_KEY) => map
            .get(ROOT_KEY)
            .ok_or_else(|| StrataError::type_mismatch("rooted mapping lost its root entry"))
            .arc_err()?,
        other => other,
    };
    if !root_container.is_container() {
        return Err(StrataError::type_mismatch(format!(
            "incoming tree must be a container, got a {}",
            root_container.kind_name()
        )))
        .arc_err();
    }

    let mut mtree = MergeTree::new();
    traverse(&mut mtree, &TreePath::root(), root_container, registry, policy)?;
    tracing::debug!(
        operations = mtree.iter().count(),
        "compiled incoming tree into a merge tree"
    );
    Ok(mtree)
}

/// The folded outcome of evaluating a token chain.
struct Folded {
    op: Option<OpKind>,
    op_args: Option<String>,
    value: Option<Value>,
}

/// Fold a chain in evaluation order: transforms thread the cumulative
/// value; the leftmost token may name an operation.
fn evaluate(chain: &Token) -> StrataResult<Folded> {
    let mut cumulative: Option<Value> = None;
    let mut node = Some(chain);
    while let Some(token) = node {
        match token.callback().action() {
            TokenAction::Transform(function) => {
                cumulative = Some(function(token.args(), cumulative.take())?);
            }
            TokenAction::Operation(kind) => {
                // The tokenizer guarantees operations are leftmost.
                return Ok(Folded {
                    op: Some(*kind),
                    op_args: token.args().map(str::to_owned),
                    value: cumulative,
                });
            }
        }
        node = token.next();
    }
    Ok(Folded {
        op: None,
        op_args: None,
        value: cumulative,
    })
}

fn entries(container: &Value) -> Vec<(PathSegment, &Value)> {
    match container {
        Value::Map(map) => map
            .iter()
            .map(|(key, value)| (PathSegment::Key(key.clone()), value))
            .collect(),
        Value::Seq(seq) => seq
            .iter()
            .enumerate()
            .map(|(index, value)| (PathSegment::Index(index), value))
            .collect(),
        _ => Vec::new(),
    }
}

fn traverse(
    mtree: &mut MergeTree,
    path: &TreePath,
    container: &Value,
    registry: &TokenRegistry,
    policy: &MergePolicyRegistry,
) -> StrataResult<()> {
    // Container-level markers are collected first so a marker element
    // affects every sibling, wherever it was declared.
    for (segment, value) in entries(container) {
        let Some(text) = value.as_str() else {
            continue;
        };
        if let Some(chain) = tokenize(text, registry)? {
            if chain.is_container_level() {
                let target = match &segment {
                    PathSegment::Index(_) => path.clone(),
                    PathSegment::Key(_) => path.join(segment.clone()),
                };
                mtree.add_meta_token(target, chain);
            }
        }
    }

    for (segment, value) in entries(container) {
        if value.is_container() {
            // A gated add first, so a subtree the base lacks materialises
            // before the merge marker descends into it.
            let empty = match value {
                Value::Map(_) => Value::Map(crate::value::Map::new()),
                _ => Value::Seq(Vec::new()),
            };
            mtree.add(
                path.clone(),
                Operation::Add {
                    key: segment.clone(),
                    value: empty,
                },
            );
            mtree.add(
                path.clone(),
                Operation::Merge {
                    key: segment.clone(),
                },
            );
            traverse(mtree, &path.join(segment), value, registry, policy)?;
            continue;
        }

        let mut effective = value.clone();
        let mut token_op: Option<OpKind> = None;
        let mut token_args: Option<String> = None;
        if let Some(text) = value.as_str() {
            if let Some(chain) = tokenize(text, registry)? {
                if chain.is_container_level() {
                    // Already recorded by the marker pre-scan; the marker
                    // element itself contributes no operation.
                    continue;
                }
                if chain.is_lazy() {
                    mtree.add_meta_token(path.clone(), chain);
                    continue;
                }
                let folded = evaluate(&chain)?;
                token_op = folded.op;
                token_args = folded.op_args;
                if let Some(folded_value) = folded.value {
                    effective = folded_value;
                } else if let Some(args) = &token_args {
                    effective = Value::Str(args.clone());
                }
            }
        }

        let marker = sibling_default(mtree, path);
        match resolve_operation(token_op, marker, policy) {
            Some(chosen) => emit(mtree, path, segment, chosen, effective, token_args.as_deref())?,
            None => emit_default(mtree, path, segment, effective),
        }
    }
    Ok(())
}

/// The default operation a container-level marker imposes on its siblings,
/// if one is recorded. Routing kinds never act as sibling defaults.
fn sibling_default(mtree: &MergeTree, path: &TreePath) -> Option<OpKind> {
    mtree.meta_tokens(path).iter().find_map(|token| {
        match token.callback().action() {
            TokenAction::Operation(kind) if !matches!(kind, OpKind::Merge | OpKind::JumpMerge) => {
                Some(*kind)
            }
            _ => None,
        }
    })
}

/// Pick the effective operation among the candidates, or `None` for the
/// default behaviour.
///
/// Weights come from the policy; a strictly greater weight wins. Under the
/// default weight map every combination ties, so resolution falls back to
/// the fixed precedence inline token > container marker > default.
fn resolve_operation(
    token_op: Option<OpKind>,
    marker: Option<OpKind>,
    policy: &MergePolicyRegistry,
) -> Option<OpKind> {
    match (token_op, marker) {
        (Some(token_kind), Some(marker_kind)) => {
            let map = policy.weight_map();
            if MARKER_RULE.weight(map) > TOKEN_RULE.weight(map) {
                Some(marker_kind)
            } else {
                Some(token_kind)
            }
        }
        (Some(kind), None) | (None, Some(kind)) => Some(kind),
        (None, None) => None,
    }
}

/// The default terminal behaviour: replace on conflict, add when the key
/// is new. The builder never sees the base, so it emits both gated
/// operations and exactly one of them fires at apply time.
fn emit_default(mtree: &mut MergeTree, path: &TreePath, segment: PathSegment, value: Value) {
    mtree.add(
        path.clone(),
        Operation::Replace {
            key: segment.clone(),
            value: value.clone(),
        },
    );
    mtree.add(path.clone(), Operation::Add { key: segment, value });
}

fn emit(
    mtree: &mut MergeTree,
    path: &TreePath,
    segment: PathSegment,
    chosen: OpKind,
    value: Value,
    op_args: Option<&str>,
) -> StrataResult<()> {
    match chosen {
        OpKind::Add => mtree.add(path.clone(), Operation::Add { key: segment, value }),
        OpKind::Replace => mtree.add(path.clone(), Operation::Replace { key: segment, value }),
        OpKind::Append | OpKind::AppendUnique => {
            emit_append(mtree, path, segment, chosen, value);
        }
        OpKind::Merge => emit_inline_merge(mtree, path, segment, value),
        OpKind::JumpMerge => {
            let Some(relative) = op_args.filter(|args| !args.is_empty()) else {
                return Err(StrataError::malformed_token(
                    "@jump_merge needs a dotted relative path argument",
                ))
                .arc_err();
            };
            mtree.add(
                path.clone(),
                Operation::JumpMerge {
                    path: TreePath::parse_dotted(relative),
                },
            );
        }
    }
    Ok(())
}

/// Sequence elements append in place; a mapping key routes into the child
/// sequence of the same name first.
fn emit_append(
    mtree: &mut MergeTree,
    path: &TreePath,
    segment: PathSegment,
    chosen: OpKind,
    value: Value,
) {
    let build = |value: Value| {
        if chosen == OpKind::AppendUnique {
            Operation::AppendUnique { value }
        } else {
            Operation::Append { value }
        }
    };
    match segment {
        PathSegment::Index(_) => mtree.add(path.clone(), build(value)),
        key @ PathSegment::Key(_) => {
            mtree.add(path.clone(), Operation::Merge { key: key.clone() });
            mtree.add(path.join(key), build(value));
        }
    }
}

/// An inline `merge` token carrying a value: route into the child and
/// fold the value in. Sequences append element-wise, mappings upsert each
/// entry (a gated replace-then-add pair), scalars append themselves.
fn emit_inline_merge(mtree: &mut MergeTree, path: &TreePath, segment: PathSegment, value: Value) {
    mtree.add(
        path.clone(),
        Operation::Merge {
            key: segment.clone(),
        },
    );
    let child = path.join(segment);
    match value {
        Value::Seq(items) => {
            for item in items {
                mtree.add(child.clone(), Operation::Append { value: item });
            }
        }
        Value::Map(fields) => {
            for (key, item) in fields {
                mtree.add(
                    child.clone(),
                    Operation::Replace {
                        key: PathSegment::Key(key.clone()),
                        value: item.clone(),
                    },
                );
                mtree.add(
                    child.clone(),
                    Operation::Add {
                        key: PathSegment::Key(key),
                        value: item,
                    },
                );
            }
        }
        scalar => mtree.add(child, Operation::Append { value: scalar }),
    }
}
