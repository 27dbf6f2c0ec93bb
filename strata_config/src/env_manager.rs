//! Per-environment base trees.
//!
//! Each environment owns an independent rooted base tree; merges applied
//! to one environment never observe another. Callers wanting parallel
//! applies may split environments across threads, since the state is
//! disjoint.

use indexmap::IndexMap;

use crate::error::StrataError;
use crate::merge::{apply_merge_tree_in_place, MergeTree};
use crate::result_ext::StrataResultExt;
use crate::value::{ensure_rooted, Map, Value};
use crate::StrataResult;

/// Owns one rooted base tree per environment name and tracks the active
/// environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvManager {
    envs: IndexMap<String, Value>,
    active: String,
}

impl EnvManager {
    /// A manager with `default_env` initialised and active.
    #[must_use]
    pub fn new(default_env: impl Into<String>) -> Self {
        let active = default_env.into();
        let mut envs = IndexMap::new();
        envs.insert(active.clone(), empty_rooted());
        Self { envs, active }
    }

    /// Initialise an empty base tree for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::DuplicateEnv`] when `name` already exists.
    pub fn init_env(&mut self, name: impl Into<String>) -> StrataResult<()> {
        let name = name.into();
        if self.envs.contains_key(&name) {
            return Err(StrataError::DuplicateEnv { name }).arc_err();
        }
        self.envs.insert(name, empty_rooted());
        Ok(())
    }

    /// The base tree for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EnvNotFound`] for uninitialised names.
    pub fn get(&self, name: &str) -> StrataResult<&Value> {
        self.envs
            .get(name)
            .ok_or_else(|| StrataError::EnvNotFound {
                name: name.to_owned(),
            })
            .arc_err()
    }

    /// The base tree of the active environment.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EnvNotFound`] when the active environment
    /// was never initialised.
    pub fn get_active(&self) -> StrataResult<&Value> {
        self.get(self.active.as_str())
    }

    /// Name of the active environment.
    #[must_use]
    pub fn active(&self) -> &str {
        &self.active
    }

    /// Switch the active environment.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EnvNotFound`] for uninitialised names.
    pub fn set_active(&mut self, name: impl Into<String>) -> StrataResult<()> {
        let name = name.into();
        if !self.envs.contains_key(&name) {
            return Err(StrataError::EnvNotFound { name }).arc_err();
        }
        self.active = name;
        Ok(())
    }

    /// The initialised environment names, in initialisation order.
    pub fn env_names(&self) -> impl Iterator<Item = &str> {
        self.envs.keys().map(String::as_str)
    }

    /// Fold a compiled merge tree into the base tree of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EnvNotFound`] for uninitialised names and
    /// surfaces type errors raised by the apply. An error mid-apply may
    /// leave that environment's tree partially merged.
    pub fn apply(&mut self, name: &str, merge_tree: &MergeTree) -> StrataResult<()> {
        let base = self
            .envs
            .get_mut(name)
            .ok_or_else(|| StrataError::EnvNotFound {
                name: name.to_owned(),
            })
            .arc_err()?;
        apply_merge_tree_in_place(base, merge_tree)
    }

    /// Seed an environment's base tree directly, replacing its current
    /// content. The tree is rooted first.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EnvNotFound`] for uninitialised names.
    pub fn seed(&mut self, name: &str, tree: Value) -> StrataResult<()> {
        let base = self
            .envs
            .get_mut(name)
            .ok_or_else(|| StrataError::EnvNotFound {
                name: name.to_owned(),
            })
            .arc_err()?;
        *base = ensure_rooted(tree);
        Ok(())
    }
}

fn empty_rooted() -> Value {
    ensure_rooted(Value::Map(Map::new()))
}
