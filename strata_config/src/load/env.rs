//! Environment-variable loader.
//!
//! Only variables whose name starts with the configured prefix
//! (case-insensitively) are considered. The prefix is stripped, the
//! remainder splits on `__` into path components, and each component is
//! lower-cased unless the schema declares the enclosing container as a
//! sequence, in which case it parses as an index. Values stay raw
//! strings; tokenization happens later, during merge-tree building.

use uncased::UncasedStr;

use crate::error::StrataError;
use crate::path::{PathSegment, TreePath};
use crate::result_ext::StrataResultExt;
use crate::schema::KeyKind;
use crate::value::{Map, Value};
use crate::StrataResult;

use super::{LoadContext, LoadRequest, Loader};

/// Loads from an environment snapshot: the live process environment or an
/// injected set of variables.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    vars: Vec<(String, String)>,
}

impl EnvLoader {
    /// Snapshot the process environment now.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Use an injected snapshot; the process environment is not touched.
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl Loader for EnvLoader {
    fn read(&self, _uri: &str) -> StrataResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn parse(
        &self,
        _bytes: &[u8],
        _request: &LoadRequest,
        ctx: &LoadContext,
    ) -> StrataResult<Value> {
        let mut tree = Value::Map(Map::new());
        let mut matched = 0usize;
        for (name, raw) in &self.vars {
            let Some(remainder) = strip_prefix_uncased(name, &ctx.envvar_prefix) else {
                continue;
            };
            if remainder.is_empty() {
                continue;
            }
            let (segments, path) = split_components(remainder, ctx);
            if ctx.only_schema_keys {
                if let Some(schema) = &ctx.schema_tree {
                    if !schema.declares(&path) {
                        tracing::trace!(var = name.as_str(), "undeclared key dropped");
                        continue;
                    }
                }
            }
            insert(&mut tree, &segments, Value::Str(raw.clone()))?;
            matched += 1;
        }
        tracing::debug!(matched, prefix = ctx.envvar_prefix.as_str(), "environment scan");
        Ok(tree)
    }
}

/// Case-insensitive prefix strip; ASCII prefixes only, which is what
/// environment conventions use.
fn strip_prefix_uncased<'var>(name: &'var str, prefix: &str) -> Option<&'var str> {
    let head = name.get(..prefix.len())?;
    (UncasedStr::new(head) == UncasedStr::new(prefix)).then(|| &name[prefix.len()..])
}

/// Split a stripped variable name into path segments, consulting the
/// schema for index coercion.
fn split_components(remainder: &str, ctx: &LoadContext) -> (Vec<PathSegment>, TreePath) {
    let mut segments = Vec::new();
    let mut path = TreePath::root();
    for component in remainder.split("__") {
        let kind = ctx
            .schema_tree
            .as_ref()
            .map_or(KeyKind::Text, |schema| schema.child_kind(&path));
        let segment = match kind {
            KeyKind::Index => component.parse::<usize>().map_or_else(
                |_| PathSegment::Key(component.to_ascii_lowercase()),
                PathSegment::Index,
            ),
            KeyKind::Text => PathSegment::Key(component.to_ascii_lowercase()),
        };
        path = path.join(segment.clone());
        segments.push(segment);
    }
    (segments, path)
}

/// The container shape an upcoming segment needs.
fn container_for(segment: &PathSegment) -> Value {
    match segment {
        PathSegment::Key(_) => Value::Map(Map::new()),
        PathSegment::Index(_) => Value::Seq(Vec::new()),
    }
}

fn insert(tree: &mut Value, segments: &[PathSegment], value: Value) -> StrataResult<()> {
    let Some((last, intermediates)) = segments.split_last() else {
        return Ok(());
    };
    let mut cursor = tree;
    for (position, segment) in intermediates.iter().enumerate() {
        let next = segments
            .get(position + 1)
            .map_or_else(|| Value::Map(Map::new()), container_for);
        cursor = descend(cursor, segment, next)?;
    }
    assign(cursor, last, value)
}

/// Step into (creating if needed) the container at `segment`.
fn descend<'tree>(
    cursor: &'tree mut Value,
    segment: &PathSegment,
    next: Value,
) -> StrataResult<&'tree mut Value> {
    coerce(cursor, segment)?;
    match (cursor, segment) {
        (Value::Map(map), PathSegment::Key(key)) => {
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            if !slot.is_container() {
                *slot = next;
            }
            Ok(slot)
        }
        (Value::Seq(seq), PathSegment::Index(idx)) => {
            if *idx >= seq.len() {
                seq.resize(idx + 1, Value::Null);
            }
            let slot = seq
                .get_mut(*idx)
                .ok_or_else(|| StrataError::type_mismatch("sequence slot vanished after resize"))
                .arc_err()?;
            if !slot.is_container() {
                *slot = next;
            }
            Ok(slot)
        }
        _ => Err(StrataError::type_mismatch(
            "environment key collides with an incompatible container",
        ))
        .arc_err(),
    }
}

fn assign(cursor: &mut Value, segment: &PathSegment, value: Value) -> StrataResult<()> {
    coerce(cursor, segment)?;
    match (cursor, segment) {
        (Value::Map(map), PathSegment::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Seq(seq), PathSegment::Index(idx)) => {
            if *idx >= seq.len() {
                seq.resize(idx + 1, Value::Null);
            }
            if let Some(slot) = seq.get_mut(*idx) {
                *slot = value;
            }
            Ok(())
        }
        _ => Err(StrataError::type_mismatch(
            "environment key collides with an incompatible container",
        ))
        .arc_err(),
    }
}

/// Give `cursor` the container kind `segment` addresses. Terminals are
/// overwritten; a container of the opposite kind is a conflict between
/// variables of the same snapshot.
fn coerce(cursor: &mut Value, segment: &PathSegment) -> StrataResult<()> {
    match (&*cursor, segment) {
        (Value::Map(_), PathSegment::Key(_)) | (Value::Seq(_), PathSegment::Index(_)) => Ok(()),
        (Value::Map(_) | Value::Seq(_), _) => Err(StrataError::type_mismatch(
            "environment key collides with an incompatible container",
        ))
        .arc_err(),
        _ => {
            *cursor = container_for(segment);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::EnvLoader;
    use crate::load::{LoadContext, LoadRequest, Loader};
    use crate::schema::{NodeKind, SchemaTree};
    use crate::value::Value;

    fn parse(loader: &EnvLoader, ctx: &LoadContext) -> Value {
        loader
            .parse(&[], &LoadRequest::new("environ", "process"), ctx)
            .expect("snapshot parses")
    }

    #[test]
    fn prefixed_variables_build_a_nested_tree() {
        let loader = EnvLoader::from_vars([
            ("STRATA_DICTY__X", "by_env"),
            ("STRATA_LISTY", "@merge by_env"),
            ("UNRELATED", "ignored"),
        ]);
        let tree = parse(&loader, &LoadContext::default());
        assert_eq!(
            tree,
            Value::from(json!({
                "dicty": {"x": "by_env"},
                "listy": "@merge by_env",
            }))
        );
    }

    #[test]
    fn prefix_matching_is_case_insensitive() {
        let loader = EnvLoader::from_vars([("strata_FOO", "bar")]);
        let tree = parse(&loader, &LoadContext::default());
        assert_eq!(tree, Value::from(json!({"foo": "bar"})));
    }

    #[test]
    fn schema_declared_sequences_coerce_components_to_indices() {
        let mut schema = SchemaTree::new();
        schema.declare("listy", NodeKind::Sequence);
        let ctx = LoadContext {
            schema_tree: Some(schema),
            ..LoadContext::default()
        };
        let loader = EnvLoader::from_vars([
            ("STRATA_LISTY__1", "second"),
            ("STRATA_LISTY__0", "first"),
        ]);
        let tree = parse(&loader, &ctx);
        assert_eq!(tree, Value::from(json!({"listy": ["first", "second"]})));
    }

    #[test]
    fn only_schema_keys_drops_undeclared_variables() {
        let mut schema = SchemaTree::new();
        schema.declare("dicty.x", NodeKind::Mapping);
        let ctx = LoadContext {
            schema_tree: Some(schema),
            only_schema_keys: true,
            ..LoadContext::default()
        };
        let loader = EnvLoader::from_vars([
            ("STRATA_DICTY__X", "kept"),
            ("STRATA_OTHER", "dropped"),
        ]);
        let tree = parse(&loader, &ctx);
        assert_eq!(tree, Value::from(json!({"dicty": {"x": "kept"}})));
    }
}
