//! TOML file loader.

use camino::Utf8Path;

use crate::error::StrataError;
use crate::result_ext::StrataResultExt;
use crate::value::Value;
use crate::StrataResult;

use super::{LoadContext, LoadRequest, Loader};

/// Reads a TOML file from `uri` and parses it into a raw tree.
///
/// Environment splitting follows the default convention: top-level tables
/// are treated as environments only when the request says so.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlLoader;

impl Loader for TomlLoader {
    fn read(&self, uri: &str) -> StrataResult<Vec<u8>> {
        let path = Utf8Path::new(uri);
        std::fs::read(path)
            .map_err(|err| StrataError::loader_failure(uri, err))
            .arc_err()
    }

    fn parse(
        &self,
        bytes: &[u8],
        request: &LoadRequest,
        _ctx: &LoadContext,
    ) -> StrataResult<Value> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| StrataError::loader_failure(request.uri.clone(), err))
            .arc_err()?;
        let table: toml::Table = toml::from_str(text)
            .map_err(|err| StrataError::loader_failure(request.uri.clone(), err))
            .arc_err()?;
        Ok(Value::from(toml::Value::Table(table)))
    }
}
