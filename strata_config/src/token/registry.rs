//! Registry mapping token identifiers to callbacks.
//!
//! A callback is either a pure transform (threaded through the cumulative
//! value while a chain is folded) or a merge-operation constructor. Lazy
//! callbacks are markers: their evaluation is deferred to a later pass and
//! the builder keeps them out of the operation lists.

use std::fmt;
use std::sync::Arc;

use crate::error::StrataError;
use crate::merge::OpKind;
use crate::result_ext::StrataResultExt;
use crate::value::Value;
use crate::StrataResult;

/// A pure transform: `(args, cumulative) -> value`.
///
/// `args` is the raw argument text of the token, never pre-split; each
/// transform parses its own arguments. `cumulative` is the value produced
/// by the previously evaluated token in the chain, if any.
pub type TransformFn = Arc<dyn Fn(Option<&str>, Option<Value>) -> StrataResult<Value> + Send + Sync>;

/// What a token does when its chain is folded.
#[derive(Clone)]
pub enum TokenAction {
    /// Produce a new cumulative value.
    Transform(TransformFn),
    /// Select a non-default merge operation for the terminal.
    Operation(OpKind),
}

impl fmt::Debug for TokenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform(_) => f.write_str("Transform(..)"),
            Self::Operation(kind) => write!(f, "Operation({kind:?})"),
        }
    }
}

impl PartialEq for TokenAction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Transform(left), Self::Transform(right)) => Arc::ptr_eq(left, right),
            (Self::Operation(left), Self::Operation(right)) => left == right,
            _ => false,
        }
    }
}

/// Callback record resolved from the registry for one token identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenCallback {
    action: TokenAction,
    is_lazy: bool,
}

impl TokenCallback {
    /// An eagerly evaluated transform.
    #[must_use]
    pub fn transform(function: TransformFn) -> Self {
        Self {
            action: TokenAction::Transform(function),
            is_lazy: false,
        }
    }

    /// A transform whose evaluation is deferred to a later pass.
    #[must_use]
    pub fn lazy_transform(function: TransformFn) -> Self {
        Self {
            action: TokenAction::Transform(function),
            is_lazy: true,
        }
    }

    /// A merge-operation constructor.
    #[must_use]
    pub const fn operation(kind: OpKind) -> Self {
        Self {
            action: TokenAction::Operation(kind),
            is_lazy: false,
        }
    }

    /// The callback's action.
    #[must_use]
    pub const fn action(&self) -> &TokenAction {
        &self.action
    }

    /// Whether evaluation is deferred.
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.is_lazy
    }
}

/// Maps bare token identifiers to [`TokenCallback`] records.
///
/// The default registry carries the builtin transforms (`int`, `str`,
/// `bool`, `float`, `json`, `sum`), the builtin operations (`add`,
/// `replace`, `merge`, `append`, `append_unique`, `jump_merge`) and the
/// lazy `format` marker.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    entries: indexmap::IndexMap<String, TokenCallback>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        let mut registry = Self {
            entries: indexmap::IndexMap::new(),
        };
        registry.install_builtins();
        registry
    }
}

impl TokenRegistry {
    /// A registry pre-populated with the builtin tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `id`.
    ///
    /// Registration is idempotent: re-registering the identical callback is
    /// accepted silently.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::DuplicateToken`] when `id` is already bound
    /// to a different callback.
    pub fn register(&mut self, id: impl Into<String>, callback: TokenCallback) -> StrataResult<()> {
        let id = id.into();
        if let Some(existing) = self.entries.get(&id) {
            if *existing == callback {
                return Ok(());
            }
            return Err(StrataError::DuplicateToken { id }).arc_err();
        }
        self.entries.insert(id, callback);
        Ok(())
    }

    /// Look up a callback, or `None` when the identifier is unregistered.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TokenCallback> {
        self.entries.get(id)
    }

    /// Look up a callback, raising for unregistered identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownToken`] when `id` is not registered.
    pub fn resolve(&self, id: &str) -> StrataResult<&TokenCallback> {
        self.get(id)
            .ok_or_else(|| StrataError::UnknownToken { id: id.to_owned() })
            .arc_err()
    }

    fn install_builtins(&mut self) {
        self.entries.insert(
            "int".to_owned(),
            TokenCallback::transform(Arc::new(transform_int)),
        );
        self.entries.insert(
            "str".to_owned(),
            TokenCallback::transform(Arc::new(transform_str)),
        );
        self.entries.insert(
            "bool".to_owned(),
            TokenCallback::transform(Arc::new(transform_bool)),
        );
        self.entries.insert(
            "float".to_owned(),
            TokenCallback::transform(Arc::new(transform_float)),
        );
        self.entries.insert(
            "json".to_owned(),
            TokenCallback::transform(Arc::new(transform_json)),
        );
        self.entries.insert(
            "sum".to_owned(),
            TokenCallback::transform(Arc::new(transform_sum)),
        );
        self.entries.insert(
            "format".to_owned(),
            TokenCallback::lazy_transform(Arc::new(transform_identity)),
        );

        self.entries
            .insert("add".to_owned(), TokenCallback::operation(OpKind::Add));
        self.entries.insert(
            "replace".to_owned(),
            TokenCallback::operation(OpKind::Replace),
        );
        self.entries
            .insert("merge".to_owned(), TokenCallback::operation(OpKind::Merge));
        self.entries.insert(
            "append".to_owned(),
            TokenCallback::operation(OpKind::Append),
        );
        self.entries.insert(
            "append_unique".to_owned(),
            TokenCallback::operation(OpKind::AppendUnique),
        );
        self.entries.insert(
            "jump_merge".to_owned(),
            TokenCallback::operation(OpKind::JumpMerge),
        );
    }
}

/// Pick the transform input: argument text wins over the cumulative value.
fn resolve_input(id: &str, args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    if let Some(text) = args {
        return Ok(Value::Str(text.to_owned()));
    }
    cumulative
        .ok_or_else(|| {
            StrataError::malformed_token(format!(
                "@{id} needs an argument or an upstream value"
            ))
        })
        .arc_err()
}

fn transform_int(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    match resolve_input("int", args, cumulative)? {
        Value::Int(n) => Ok(Value::Int(n)),
        Value::Str(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| StrataError::malformed_token(format!("@int cannot parse {text:?}")))
            .arc_err(),
        other => Err(StrataError::malformed_token(format!(
            "@int cannot convert a {}",
            other.kind_name()
        )))
        .arc_err(),
    }
}

fn transform_float(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    match resolve_input("float", args, cumulative)? {
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Int(n) => Ok(Value::Float(n as f64)),
        Value::Str(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| StrataError::malformed_token(format!("@float cannot parse {text:?}")))
            .arc_err(),
        other => Err(StrataError::malformed_token(format!(
            "@float cannot convert a {}",
            other.kind_name()
        )))
        .arc_err(),
    }
}

fn transform_str(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    let rendered = match resolve_input("str", args, cumulative)? {
        Value::Str(text) => text,
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        container => container.to_json().to_string(),
    };
    Ok(Value::Str(rendered))
}

fn transform_bool(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    let input = resolve_input("bool", args, cumulative)?;
    let parsed = match &input {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Str(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Value::Bool)
        .ok_or_else(|| {
            StrataError::malformed_token(format!(
                "@bool cannot interpret a {}",
                input.kind_name()
            ))
        })
        .arc_err()
}

fn transform_json(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    match resolve_input("json", args, cumulative)? {
        Value::Str(text) => serde_json::from_str::<serde_json::Value>(&text)
            .map(Value::from)
            .map_err(|err| StrataError::malformed_token(format!("@json: {err}")))
            .arc_err(),
        other => Err(StrataError::malformed_token(format!(
            "@json expects text, got a {}",
            other.kind_name()
        )))
        .arc_err(),
    }
}

fn transform_sum(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    let input = resolve_input("sum", args, cumulative)?;
    let terms: Vec<Value> = match input {
        Value::Str(text) => text
            .split_whitespace()
            .map(|term| {
                term.parse::<i64>().map(Value::Int).or_else(|_| {
                    term.parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| StrataError::malformed_token(
                            format!("@sum cannot parse term {term:?}"),
                        ))
                })
            })
            .collect::<Result<_, _>>()
            .arc_err()?,
        Value::Seq(items) => items,
        other => {
            return Err(StrataError::malformed_token(format!(
                "@sum expects text or a sequence, got a {}",
                other.kind_name()
            )))
            .arc_err();
        }
    };

    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for term in &terms {
        match term {
            Value::Int(n) => {
                int_total += n;
                float_total += *n as f64;
            }
            Value::Float(f) => {
                saw_float = true;
                float_total += f;
            }
            other => {
                return Err(StrataError::malformed_token(format!(
                    "@sum cannot add a {}",
                    other.kind_name()
                )))
                .arc_err();
            }
        }
    }
    if saw_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(int_total))
    }
}

fn transform_identity(args: Option<&str>, cumulative: Option<Value>) -> StrataResult<Value> {
    resolve_input("format", args, cumulative)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::{TokenCallback, TokenRegistry, transform_identity};
    use crate::error::StrataError;
    use crate::merge::OpKind;
    use crate::value::Value;

    fn call(registry: &TokenRegistry, id: &str, args: Option<&str>, cumulative: Option<Value>) -> Value {
        let callback = registry.resolve(id).expect("builtin present");
        match callback.action() {
            super::TokenAction::Transform(f) => {
                f(args, cumulative).expect("transform succeeds")
            }
            super::TokenAction::Operation(_) => panic!("{id} is not a transform"),
        }
    }

    #[rstest]
    #[case::int("int", Some("123"), Value::Int(123))]
    #[case::float("float", Some("1.5"), Value::Float(1.5))]
    #[case::bool_yes("bool", Some("Yes"), Value::Bool(true))]
    #[case::bool_off("bool", Some("off"), Value::Bool(false))]
    #[case::sum("sum", Some("5 5 5 5"), Value::Int(20))]
    fn builtin_transforms_parse_their_arguments(
        #[case] id: &str,
        #[case] args: Option<&str>,
        #[case] expected: Value,
    ) {
        let registry = TokenRegistry::new();
        assert_eq!(call(&registry, id, args, None), expected);
    }

    #[test]
    fn str_renders_the_cumulative_value() {
        let registry = TokenRegistry::new();
        assert_eq!(
            call(&registry, "str", None, Some(Value::Int(20))),
            Value::Str("20".into())
        );
    }

    #[test]
    fn json_builds_containers() {
        let registry = TokenRegistry::new();
        let parsed = call(&registry, "json", Some(r#"[1, "two"]"#), None);
        assert_eq!(
            parsed,
            Value::Seq(vec![Value::Int(1), Value::Str("two".into())])
        );
    }

    #[test]
    fn format_is_registered_lazy() {
        let registry = TokenRegistry::new();
        let callback = registry.resolve("format").expect("builtin present");
        assert!(callback.is_lazy());
    }

    #[test]
    fn unknown_identifier_is_fatal() {
        let registry = TokenRegistry::new();
        let err = registry.resolve("nope").expect_err("must fail");
        assert!(matches!(&*err, StrataError::UnknownToken { id } if id == "nope"));
    }

    #[test]
    fn re_registering_the_same_callback_is_idempotent() {
        let mut registry = TokenRegistry::new();
        registry
            .register("merge", TokenCallback::operation(OpKind::Merge))
            .expect("identical registration accepted");
    }

    #[test]
    fn conflicting_registration_raises_duplicate_token() {
        let mut registry = TokenRegistry::new();
        let err = registry
            .register("merge", TokenCallback::operation(OpKind::Replace))
            .expect_err("conflict must fail");
        assert!(matches!(&*err, StrataError::DuplicateToken { id } if id == "merge"));

        let err = registry
            .register("int", TokenCallback::transform(Arc::new(transform_identity)))
            .expect_err("different transform must fail");
        assert!(matches!(&*err, StrataError::DuplicateToken { id } if id == "int"));
    }
}
