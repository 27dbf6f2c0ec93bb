//! The inline token mini-language: `@id args @id args …`.
//!
//! A scalar is a candidate token string iff it is textual and begins with
//! `@`. Tokens are declared left to right and evaluated right to left; the
//! tokenizer therefore returns the chain in evaluation order, innermost
//! first, with each token's `next` pointing at the token applied after it.

mod registry;

use std::sync::LazyLock;

use regex::Regex;

pub use registry::{TokenAction, TokenCallback, TokenRegistry, TransformFn};

use crate::error::StrataError;
use crate::result_ext::StrataResultExt;
use crate::StrataResult;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("@[A-Za-z0-9_-]+").expect("valid marker pattern"));

/// One parsed segment of a token string, linked to the token evaluated
/// after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    id: String,
    args: Option<String>,
    callback: TokenCallback,
    is_container_level: bool,
    next: Option<Box<Token>>,
}

impl Token {
    /// The bare identifier, without the `@` sigil.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw argument text, trimmed but never split.
    #[must_use]
    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }

    /// The callback resolved from the registry.
    #[must_use]
    pub const fn callback(&self) -> &TokenCallback {
        &self.callback
    }

    /// The token evaluated after this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<&Token> {
        self.next.as_deref()
    }

    /// Whether this chain addresses the containing container rather than
    /// the terminal it appears inside: a lone operation token with no
    /// argument text.
    #[must_use]
    pub const fn is_container_level(&self) -> bool {
        self.is_container_level
    }

    /// Whether any token in the chain defers evaluation to a later pass.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.iter().any(|token| token.callback.is_lazy())
    }

    /// Iterate the chain in evaluation order, starting with this token.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        std::iter::successors(Some(self), |token| token.next())
    }

    /// Render the chain back into its declared (left-to-right) form.
    ///
    /// `tokenize` is a left-inverse of this rendering for well-formed
    /// chains.
    #[must_use]
    pub fn render_declared(&self) -> String {
        let mut declared: Vec<&Token> = self.iter().collect();
        declared.reverse();
        let mut out = String::new();
        for token in declared {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push('@');
            out.push_str(&token.id);
            if let Some(args) = &token.args {
                out.push(' ');
                out.push_str(args);
            }
        }
        out
    }
}

/// Parse a scalar string into a token chain in evaluation order.
///
/// Returns `Ok(None)` when `input` does not begin with the `@` sigil: the
/// scalar is a literal value, not a token string.
///
/// # Examples
///
/// ```rust
/// use strata_config::{TokenRegistry, tokenize};
///
/// let registry = TokenRegistry::new();
/// let chain = tokenize("@str @sum 5 5 5 5", &registry)
///     .expect("well-formed")
///     .expect("is a token string");
/// // Declared left to right, evaluated right to left: `sum` comes first.
/// assert_eq!(chain.id(), "sum");
/// assert_eq!(chain.args(), Some("5 5 5 5"));
/// assert_eq!(chain.next().map(|t| t.id()), Some("str"));
/// assert!(tokenize("plain value", &registry).expect("no sigil").is_none());
/// ```
///
/// # Errors
///
/// [`StrataError::MalformedToken`] for a bare or empty sigil and for
/// operation tokens that are not the leftmost segment;
/// [`StrataError::UnknownToken`] for identifiers the registry does not
/// know.
pub fn tokenize(input: &str, registry: &TokenRegistry) -> StrataResult<Option<Token>> {
    if !input.starts_with('@') {
        return Ok(None);
    }

    let markers: Vec<regex::Match<'_>> = MARKER.find_iter(input).collect();
    let Some(first) = markers.first() else {
        return Err(StrataError::malformed_token(format!(
            "sigil without an identifier in {input:?}"
        )))
        .arc_err();
    };
    if first.start() != 0 {
        return Err(StrataError::malformed_token(format!(
            "token string must start with a marker, got {input:?}"
        )))
        .arc_err();
    }

    let single_segment = markers.len() == 1;
    let mut chain: Option<Box<Token>> = None;
    for (position, marker) in markers.iter().enumerate() {
        let id = &input[marker.start() + 1..marker.end()];
        let tail = markers
            .get(position + 1)
            .map_or(&input[marker.end()..], |next| {
                &input[marker.end()..next.start()]
            });
        let args = {
            let trimmed = tail.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        };
        let callback = registry.resolve(id)?.clone();
        let is_container_level = single_segment
            && args.is_none()
            && matches!(callback.action(), TokenAction::Operation(_));
        chain = Some(Box::new(Token {
            id: id.to_owned(),
            args,
            callback,
            is_container_level,
            next: chain,
        }));
    }

    let head = chain.map(|boxed| *boxed);
    if let Some(head) = &head {
        for token in head.iter() {
            if matches!(token.callback.action(), TokenAction::Operation(_))
                && token.next.is_some()
            {
                return Err(StrataError::malformed_token(format!(
                    "operation token '@{}' must be the leftmost segment",
                    token.id
                )))
                .arc_err();
            }
        }
    }
    Ok(head)
}
