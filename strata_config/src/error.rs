//! Error types produced by the merge and evaluation core.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while tokenizing, building or applying merge trees,
/// or while loading raw configuration data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrataError {
    /// A token string that cannot be parsed: bad sigil, zero-length
    /// identifier, or an operation token that is not the leftmost segment.
    #[error("malformed token: {message}")]
    MalformedToken {
        /// Human-readable explanation of the parse failure.
        message: String,
    },

    /// A token identifier absent from the registry.
    #[error("unknown token '@{id}'")]
    UnknownToken {
        /// The identifier that failed resolution.
        id: String,
    },

    /// A registration-time conflict: the identifier is already bound to a
    /// different callback.
    #[error("token '@{id}' is already registered with a different callback")]
    DuplicateToken {
        /// The conflicting identifier.
        id: String,
    },

    /// An operation applied to the wrong container kind, for example
    /// `Append` on a mapping or a `Merge` hop landing on a terminal.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Description of the offending operation and target.
        message: String,
    },

    /// A path that does not resolve against the queried tree.
    #[error("path not found: {path}")]
    PathNotFound {
        /// Dotted rendering of the missing path.
        path: String,
    },

    /// An environment name with no initialised base tree.
    #[error("unknown environment '{name}'")]
    EnvNotFound {
        /// The requested environment name.
        name: String,
    },

    /// An environment initialised twice.
    #[error("environment '{name}' is already initialised")]
    DuplicateEnv {
        /// The conflicting environment name.
        name: String,
    },

    /// No weight assignment satisfies the requested priority ordering
    /// within the search cap.
    #[error("no weight map satisfies the policy ordering after {attempts} attempts")]
    UnsatisfiablePolicy {
        /// Number of candidate assignments that were examined.
        attempts: u32,
    },

    /// A loader-side I/O or parse error, surfaced without wrapping.
    #[error("loader failure for '{uri}': {source}")]
    LoaderFailure {
        /// The resource the loader was asked to read.
        uri: String,
        /// Underlying error reported by the loader.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A loader id absent from the registry.
    #[error("no loader registered under id '{id}'")]
    UnknownLoader {
        /// The identifier that failed resolution.
        id: String,
    },

    /// A loader registered under an id that is already taken.
    #[error("a loader is already registered under id '{id}'")]
    DuplicateLoader {
        /// The conflicting identifier.
        id: String,
    },
}

impl StrataError {
    /// Construct a [`StrataError::MalformedToken`] from a message.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Construct a [`StrataError::TypeMismatch`] from a message.
    #[must_use]
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Construct a [`StrataError::LoaderFailure`] from a uri and source error.
    #[must_use]
    pub fn loader_failure(
        uri: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::LoaderFailure {
            uri: uri.into(),
            source: source.into(),
        }
    }

    /// Construct a [`StrataError::LoaderFailure`] wrapped in an [`Arc`],
    /// ready for use with [`crate::StrataResult`].
    #[must_use]
    pub fn loader_failure_arc(
        uri: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Arc<Self> {
        Arc::new(Self::loader_failure(uri, source))
    }
}

#[cfg(test)]
mod tests {
    use super::StrataError;

    #[test]
    fn display_includes_token_identifier() {
        let err = StrataError::UnknownToken { id: "nope".into() };
        assert_eq!(err.to_string(), "unknown token '@nope'");
    }

    #[test]
    fn loader_failure_carries_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StrataError::loader_failure("settings.toml", io);
        let rendered = err.to_string();
        assert!(rendered.contains("settings.toml"), "got: {rendered}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
