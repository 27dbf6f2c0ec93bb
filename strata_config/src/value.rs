//! The raw tree value model: terminals plus ordered containers.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::path::{PathSegment, ROOT_KEY};

/// Ordered mapping container. Insertion order is preserved for iteration;
/// equality ignores order.
pub type Map = IndexMap<String, Value>;

/// A node in a raw configuration tree.
///
/// Anything that is not [`Value::Map`] or [`Value::Seq`] is a terminal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or explicitly null.
    #[default]
    Null,
    /// Boolean terminal.
    Bool(bool),
    /// Integer terminal.
    Int(i64),
    /// Floating-point terminal.
    Float(f64),
    /// Textual terminal.
    Str(String),
    /// Ordered sequence container.
    Seq(Vec<Value>),
    /// Ordered mapping container.
    Map(Map),
}

impl Value {
    /// Whether this node is a mapping or a sequence.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Seq(_))
    }

    /// Borrow the mapping entries, if this is a mapping.
    #[must_use]
    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrow the mapping entries, if this is a mapping.
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the sequence elements, if this is a sequence.
    #[must_use]
    pub const fn as_seq(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Mutably borrow the sequence elements, if this is a sequence.
    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Borrow the textual content, if this is a string terminal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Resolve a child by path segment.
    ///
    /// A [`PathSegment::Key`] resolves against mappings and a
    /// [`PathSegment::Index`] against sequences; any other pairing yields
    /// `None`. The two segment kinds are never conflated.
    #[must_use]
    pub fn get(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Self::Map(map), PathSegment::Key(key)) => map.get(key.as_str()),
            (Self::Seq(seq), PathSegment::Index(idx)) => seq.get(*idx),
            _ => None,
        }
    }

    /// Mutable variant of [`Value::get`].
    pub fn get_mut(&mut self, segment: &PathSegment) -> Option<&mut Value> {
        match (self, segment) {
            (Self::Map(map), PathSegment::Key(key)) => map.get_mut(key.as_str()),
            (Self::Seq(seq), PathSegment::Index(idx)) => seq.get_mut(*idx),
            _ => None,
        }
    }

    /// Short name of the node kind, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "mapping",
        }
    }

    /// Convert into the equivalent [`serde_json::Value`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Str(s) => serde_json::Value::from(s.as_str()),
            Self::Seq(seq) => serde_json::Value::Array(seq.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Seq(seq) => {
                let mut state = serializer.serialize_seq(Some(seq.len()))?;
                for item in seq {
                    state.serialize_element(item)?;
                }
                state.end()
            }
            Self::Map(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    state.serialize_entry(key, value)?;
                }
                state.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Seq(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Map(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                Self::Int,
            ),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::Seq(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(feature = "toml")]
impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::Str(s),
            toml::Value::Integer(n) => Self::Int(n),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Datetime(dt) => Self::Str(dt.to_string()),
            toml::Value::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
            toml::Value::Table(table) => Self::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Normalise a tree so that paths unambiguously anchor at `root`.
///
/// A mapping that already carries a `root` key is returned unchanged; any
/// other tree is wrapped as `{root: tree}`. The function is idempotent.
///
/// # Examples
///
/// ```rust
/// use strata_config::{Value, ensure_rooted};
/// use serde_json::json;
///
/// let tree = Value::from(json!({"foo": 1}));
/// let rooted = ensure_rooted(tree);
/// assert_eq!(rooted, Value::from(json!({"root": {"foo": 1}})));
/// assert_eq!(ensure_rooted(rooted.clone()), rooted);
/// ```
#[must_use]
pub fn ensure_rooted(tree: Value) -> Value {
    if matches!(&tree, Value::Map(map) if map.contains_key(ROOT_KEY)) {
        return tree;
    }
    let mut wrapper = Map::new();
    wrapper.insert(ROOT_KEY.to_owned(), tree);
    Value::Map(wrapper)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Value, ensure_rooted};
    use crate::path::PathSegment;

    #[test]
    fn json_round_trip_preserves_structure() {
        let source = json!({"a": 1, "b": [true, null, 2.5], "c": {"d": "x"}});
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn mapping_equality_ignores_insertion_order() {
        let left = Value::from(json!({"a": 1, "b": 2}));
        let right = Value::from(json!({"b": 2, "a": 1}));
        assert_eq!(left, right);
    }

    #[test]
    fn get_refuses_blurred_segment_kinds() {
        let tree = Value::from(json!({"0": "zero"}));
        assert!(tree.get(&PathSegment::Index(0)).is_none());
        assert_eq!(
            tree.get(&PathSegment::key("0")),
            Some(&Value::from("zero"))
        );
    }

    #[test]
    fn ensure_rooted_does_not_double_wrap() {
        let tree = Value::from(json!({"foo": "bar"}));
        let once = ensure_rooted(tree);
        let twice = ensure_rooted(once.clone());
        assert_eq!(once, twice);
    }
}
