//! Process-wide trust bundle provisioning.
//!
//! [`global_init`] must run once before the first request is submitted. It
//! settles on a CA bundle path, writing the bundled PEM there if the file does
//! not exist yet. The path never changes afterwards and is never torn down.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the bundle inside the trust directory.
pub const BUNDLE_FILE_NAME: &str = "cacert";

static CA_INFO: OnceCell<PathBuf> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Directory holding (or receiving) the bundle, e.g. the app's data dir.
    pub directory: PathBuf,
    /// PEM contents to provision when no bundle exists yet.
    pub bundled: Option<&'static [u8]>,
}

impl TrustConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            bundled: None,
        }
    }

    pub fn with_bundled(mut self, pem: &'static [u8]) -> Self {
        self.bundled = Some(pem);
        self
    }
}

/// Provision the bundle and pin its path for the rest of the process.
///
/// Idempotent: later calls return the path chosen by the first successful one
/// and ignore their own config.
pub fn global_init(config: &TrustConfig) -> Result<&'static Path, NetError> {
    CA_INFO
        .get_or_try_init(|| provision(config))
        .map(PathBuf::as_path)
}

/// The pinned bundle path, `None` before [`global_init`].
pub fn ca_info_path() -> Option<&'static Path> {
    CA_INFO.get().map(PathBuf::as_path)
}

fn provision(config: &TrustConfig) -> Result<PathBuf, NetError> {
    let path = config.directory.join(BUNDLE_FILE_NAME);
    if path.is_file() {
        tracing::debug!(path = %path.display(), "using existing trust bundle");
        return Ok(path);
    }

    let pem = config.bundled.ok_or_else(|| {
        tracing::warn!(path = %path.display(), "no trust bundle on disk and none bundled");
        NetError::TrustBundleUnavailable
    })?;
    fs::create_dir_all(&config.directory).trust_context(&config.directory)?;
    fs::write(&path, pem).trust_context(&path)?;
    tracing::debug!(path = %path.display(), bytes = pem.len(), "provisioned trust bundle");
    Ok(path)
}
