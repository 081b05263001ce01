// Application state module
// Shared, read-mostly state handed to every connection

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::store::UploadLocks;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Absolute path of the store root
    pub root: PathBuf,
    /// Serializes concurrent uploads to the same target
    pub upload_locks: UploadLocks,
}

impl AppState {
    pub fn new(config: Config, root: &Path) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            upload_locks: UploadLocks::new(),
        }
    }

    #[inline]
    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
