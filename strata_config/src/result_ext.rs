//! Extensions for mapping errors into [`StrataResult`] concisely.

use std::sync::Arc;

use crate::{StrataError, StrataResult};

/// Convert a plain `Result<T, StrataError>` into the `Arc`-wrapped
/// [`StrataResult`] used by public signatures.
///
/// Internal helpers produce bare [`StrataError`] values; this trait avoids
/// repeating `.map_err(Arc::new)` at every boundary.
pub trait StrataResultExt<T> {
    /// Wrap the error side in an [`Arc`].
    fn arc_err(self) -> StrataResult<T>;
}

impl<T> StrataResultExt<T> for Result<T, StrataError> {
    fn arc_err(self) -> StrataResult<T> {
        self.map_err(Arc::new)
    }
}
