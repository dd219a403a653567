//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into `NetError` variants and logging the path involved.

use crate::base::neterror::NetError;
use std::io;
use std::path::Path;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Map an IO error raised while opening an output file.
    ///
    /// # Example
    /// ```ignore
    /// use easynet::base::context::IoResultExt;
    ///
    /// let file = File::create(path).sink_context(path)?;
    /// ```
    fn sink_context(self, path: &Path) -> Result<T, NetError>;

    /// Map an IO error raised while provisioning the trust bundle.
    fn trust_context(self, path: &Path) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn sink_context(self, path: &Path) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to open output file");
            NetError::FileSinkOpenFailed
        })
    }

    fn trust_context(self, path: &Path) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to provision trust bundle");
            NetError::TrustBundleUnavailable
        })
    }
}
