//! Core crate for the `strata_config` layered-settings engine.
//!
//! Raw hierarchical data arrives from loaders (files, the process
//! environment, in-memory payloads) and is compiled into a [`MergeTree`],
//! a side-structure mapping tree paths to ordered operation lists. The
//! merge tree is then applied to a persistent base tree with well-defined
//! precedence, tie-breaking and override semantics. A compact inline
//! token language embedded in scalar values (`"@int 123"`,
//! `"@add @int 999"`, `"@merge by_env"`) selects non-default merge
//! operations and applies simple value transformations.
//!
//! The pipeline, end to end:
//!
//! ```rust
//! use serde_json::json;
//! use strata_config::{
//!     MergePolicyRegistry, TokenRegistry, Value, apply_merge_tree, create_merge_tree,
//!     get_dotted,
//! };
//!
//! # fn main() -> strata_config::StrataResult<()> {
//! let registry = TokenRegistry::new();
//! let policy = MergePolicyRegistry::new();
//!
//! let base = Value::from(json!({"root": {
//!     "value_a": 111,
//!     "nested": {"foo": 333, "bar": 444},
//! }}));
//! let income = Value::from(json!({
//!     "value_c": "@add @int 999",
//!     "nested": {"bar": "@int 999", "spam": "@int 555"},
//! }));
//!
//! let merge_tree = create_merge_tree(&income, &registry, &policy)?;
//! let merged = apply_merge_tree(&base, &merge_tree)?;
//!
//! assert_eq!(get_dotted(&merged, "nested.bar")?, &Value::Int(999));
//! assert_eq!(get_dotted(&merged, "nested.spam")?, &Value::Int(555));
//! assert_eq!(get_dotted(&merged, "value_c")?, &Value::Int(999));
//! assert_eq!(get_dotted(&merged, "value_a")?, &Value::Int(111));
//! # Ok(())
//! # }
//! ```
//!
//! The core is single-threaded and synchronous. All mutable state lives
//! in the caller-supplied base trees; different environments address
//! disjoint state and may be merged in parallel by the caller.

use std::sync::Arc;

mod env_manager;
mod error;
mod inspect;
mod load;
mod merge;
mod path;
mod result_ext;
mod schema;
mod token;
mod value;

pub use env_manager::EnvManager;
pub use error::StrataError;
pub use inspect::{get_dotted, get_path};
#[cfg(feature = "toml")]
pub use load::TomlLoader;
pub use load::{
    DirectLoader, EnvDataMap, EnvLoader, LoadContext, LoadRequest, Loader, LoaderRegistry, load,
    split_envs_by_top_level,
};
pub use merge::{
    apply_merge_tree, apply_merge_tree_in_place, create_merge_tree, AttrWeight, MatchCase,
    MergePolicyRegistry, MergeTree, OpKind, Operation, RuleAttrs, RuleWeightMap,
};
pub use path::{PathSegment, TreePath, ROOT_KEY};
pub use result_ext::StrataResultExt;
pub use schema::{KeyKind, NodeKind, SchemaTree};
pub use token::{tokenize, Token, TokenAction, TokenCallback, TokenRegistry, TransformFn};
pub use value::{ensure_rooted, Map, Value};

/// Canonical result type for public APIs in this crate.
///
/// Errors are wrapped in an [`Arc`] to keep `Result` small on public
/// signatures and make propagated errors cheap to clone.
pub type StrataResult<T> = std::result::Result<T, Arc<StrataError>>;
