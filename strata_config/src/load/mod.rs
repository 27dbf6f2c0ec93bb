//! Loading raw configuration data and splitting it into environments.
//!
//! Loaders are external collaborators behind a three-step protocol:
//! `read` a resource into bytes, `parse` the bytes into a raw tree, and
//! `split_envs` the tree into an environment→tree map. The merge core
//! consumes the per-environment trees; it never touches I/O itself.

mod direct;
mod env;
#[cfg(feature = "toml")]
mod toml;

use indexmap::IndexMap;
use uncased::UncasedStr;

use crate::error::StrataError;
use crate::result_ext::StrataResultExt;
use crate::schema::SchemaTree;
use crate::value::Value;
use crate::StrataResult;

pub use direct::DirectLoader;
pub use env::EnvLoader;
#[cfg(feature = "toml")]
pub use toml::TomlLoader;

/// Map from environment name to its raw tree.
pub type EnvDataMap = IndexMap<String, Value>;

/// A request to load one resource through a registered loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadRequest {
    /// Registry id of the loader to use.
    pub loader_id: String,
    /// Resource locator handed to the loader's `read` step.
    pub uri: String,
    /// Relative ordering among requests; lower loads first.
    pub order: u32,
    /// Override for the loader's own explicit-envs default.
    pub has_explicit_envs: Option<bool>,
    /// Per-request environment filter, case-insensitive.
    pub allowed_env_list: Option<Vec<String>>,
    /// In-memory payload for loaders that skip the read step.
    pub direct_data: Option<Value>,
}

impl LoadRequest {
    /// A request for `loader_id` against `uri`.
    #[must_use]
    pub fn new(loader_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            loader_id: loader_id.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Carry an in-memory payload instead of reading `uri`.
    #[must_use]
    pub fn with_direct_data(mut self, data: Value) -> Self {
        self.direct_data = Some(data);
        self
    }

    /// Declare whether the payload's top level names environments.
    #[must_use]
    pub const fn with_explicit_envs(mut self, has_explicit_envs: bool) -> Self {
        self.has_explicit_envs = Some(has_explicit_envs);
        self
    }

    /// Restrict the result to the given environments.
    #[must_use]
    pub fn with_allowed_envs(mut self, envs: Vec<String>) -> Self {
        self.allowed_env_list = Some(envs);
        self
    }
}

/// Ambient settings consulted while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadContext {
    /// Environment used when a payload carries no explicit environments.
    pub default_env_name: String,
    /// Prefix selecting process environment variables, compared
    /// case-insensitively.
    pub envvar_prefix: String,
    /// Context-wide environment filter; a request-level filter wins.
    pub allowed_envs: Option<Vec<String>>,
    /// Schema hints for coercing environment-variable key components.
    pub schema_tree: Option<SchemaTree>,
    /// Drop environment keys the schema does not declare.
    pub only_schema_keys: bool,
}

impl Default for LoadContext {
    fn default() -> Self {
        Self {
            default_env_name: "default".to_owned(),
            envvar_prefix: "STRATA_".to_owned(),
            allowed_envs: None,
            schema_tree: None,
            only_schema_keys: false,
        }
    }
}

/// The loader protocol: read, parse, split.
pub trait Loader {
    /// Fetch the raw bytes of `uri`.
    ///
    /// # Errors
    ///
    /// [`StrataError::LoaderFailure`] on I/O errors.
    fn read(&self, uri: &str) -> StrataResult<Vec<u8>>;

    /// Parse raw bytes into a raw tree. The request and context are
    /// available for loaders that parse from in-memory payloads or
    /// consult schema hints.
    ///
    /// # Errors
    ///
    /// [`StrataError::LoaderFailure`] on parse errors.
    fn parse(&self, bytes: &[u8], request: &LoadRequest, ctx: &LoadContext) -> StrataResult<Value>;

    /// Split a parsed tree into per-environment trees.
    ///
    /// The default implementation treats the top-level keys as
    /// environment names when `has_explicit_envs` is set and otherwise
    /// assigns the whole tree to `default_env`.
    ///
    /// # Errors
    ///
    /// [`StrataError::LoaderFailure`] when the tree cannot be split.
    fn split_envs(
        &self,
        tree: Value,
        has_explicit_envs: bool,
        default_env: &str,
    ) -> StrataResult<EnvDataMap> {
        Ok(split_envs_by_top_level(tree, has_explicit_envs, default_env))
    }

    /// Whether this loader's payloads name environments at the top level
    /// by default. Requests can override per load.
    fn has_explicit_envs(&self) -> bool {
        false
    }
}

/// Default env-split: explicit top-level environments or everything under
/// the default environment.
#[must_use]
pub fn split_envs_by_top_level(
    tree: Value,
    has_explicit_envs: bool,
    default_env: &str,
) -> EnvDataMap {
    let mut envs = EnvDataMap::new();
    if has_explicit_envs {
        if let Value::Map(map) = tree {
            for (env, data) in map {
                envs.insert(env, data);
            }
            return envs;
        }
    }
    envs.insert(default_env.to_owned(), tree);
    envs
}

/// String-keyed registry of loaders.
///
/// The default registry carries the builtin `direct` loader, an `environ`
/// loader snapshotting the process environment, and (with the `toml`
/// feature) a `toml` file loader.
pub struct LoaderRegistry {
    loaders: IndexMap<String, Box<dyn Loader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut loaders: IndexMap<String, Box<dyn Loader>> = IndexMap::new();
        loaders.insert("direct".to_owned(), Box::new(DirectLoader));
        loaders.insert("environ".to_owned(), Box::new(EnvLoader::from_process_env()));
        #[cfg(feature = "toml")]
        loaders.insert("toml".to_owned(), Box::new(TomlLoader));
        Self { loaders }
    }
}

impl LoaderRegistry {
    /// A registry pre-populated with the builtin loaders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::DuplicateLoader`] when `id` is taken.
    pub fn register(&mut self, id: impl Into<String>, loader: Box<dyn Loader>) -> StrataResult<()> {
        let id = id.into();
        if self.loaders.contains_key(&id) {
            return Err(StrataError::DuplicateLoader { id }).arc_err();
        }
        self.loaders.insert(id, loader);
        Ok(())
    }

    /// Replace or insert a loader unconditionally. Useful for swapping
    /// the `environ` loader for an injected snapshot in tests.
    pub fn replace(&mut self, id: impl Into<String>, loader: Box<dyn Loader>) {
        self.loaders.insert(id.into(), loader);
    }

    /// Look up a loader.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownLoader`] when `id` is not registered.
    pub fn get(&self, id: &str) -> StrataResult<&dyn Loader> {
        self.loaders
            .get(id)
            .map(|loader| loader.as_ref())
            .ok_or_else(|| StrataError::UnknownLoader { id: id.to_owned() })
            .arc_err()
    }
}

/// Run the full load pipeline for one request: read, parse, split, then
/// filter environments case-insensitively.
///
/// # Errors
///
/// [`StrataError::UnknownLoader`] for unregistered ids and
/// [`StrataError::LoaderFailure`] bubbled up from the loader steps.
pub fn load(
    request: &LoadRequest,
    registry: &LoaderRegistry,
    ctx: &LoadContext,
) -> StrataResult<EnvDataMap> {
    let loader = registry.get(&request.loader_id)?;
    let has_explicit_envs = request
        .has_explicit_envs
        .unwrap_or_else(|| loader.has_explicit_envs());

    let bytes = loader.read(&request.uri)?;
    let tree = loader.parse(&bytes, request, ctx)?;
    let mut envs = loader.split_envs(tree, has_explicit_envs, &ctx.default_env_name)?;

    let allowed = request.allowed_env_list.as_ref().or(ctx.allowed_envs.as_ref());
    if let Some(allowed) = allowed {
        envs.retain(|env, _| {
            let keep = allowed
                .iter()
                .any(|candidate| UncasedStr::new(candidate) == UncasedStr::new(env));
            if !keep {
                tracing::warn!(env = %env, uri = %request.uri, "environment filtered out of load result");
            }
            keep
        });
    }
    Ok(envs)
}
