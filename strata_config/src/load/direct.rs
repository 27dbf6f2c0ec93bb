//! The in-memory loader used by tests and embedding callers.

use crate::error::StrataError;
use crate::result_ext::StrataResultExt;
use crate::value::Value;
use crate::StrataResult;

use super::{LoadContext, LoadRequest, Loader};

/// Serves the request's `direct_data` payload verbatim; the read step is
/// a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLoader;

impl Loader for DirectLoader {
    fn read(&self, _uri: &str) -> StrataResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn parse(
        &self,
        _bytes: &[u8],
        request: &LoadRequest,
        _ctx: &LoadContext,
    ) -> StrataResult<Value> {
        request
            .direct_data
            .clone()
            .ok_or_else(|| {
                StrataError::loader_failure(
                    request.uri.clone(),
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "the direct loader requires a direct_data payload",
                    ),
                )
            })
            .arc_err()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::DirectLoader;
    use crate::error::StrataError;
    use crate::load::{LoadContext, LoadRequest, Loader};
    use crate::value::Value;

    #[test]
    fn parse_returns_the_payload() {
        let request = LoadRequest::new("direct", "unit_test")
            .with_direct_data(Value::from(json!({"foo": 1})));
        let parsed = DirectLoader
            .parse(&[], &request, &LoadContext::default())
            .expect("payload present");
        assert_eq!(parsed, Value::from(json!({"foo": 1})));
    }

    #[test]
    fn a_missing_payload_is_a_loader_failure() {
        let request = LoadRequest::new("direct", "unit_test");
        let err = DirectLoader
            .parse(&[], &request, &LoadContext::default())
            .expect_err("must fail");
        assert!(matches!(&*err, StrataError::LoaderFailure { uri, .. } if uri == "unit_test"));
    }
}
