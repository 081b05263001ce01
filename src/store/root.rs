//! Store root lifecycle
//!
//! The root is either a directory named by the operator, which outlives the
//! process, or a temporary directory that is removed on clean shutdown.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::StorageConfig;
use crate::logger;

/// The directory under which all served and uploaded files live
#[derive(Debug)]
pub struct StoreRoot {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl StoreRoot {
    /// Open the store root described by `config`
    ///
    /// An empty `directory` creates a fresh temporary directory. Otherwise
    /// the directory is created (with parents) when missing.
    pub fn open(config: &StorageConfig) -> io::Result<Self> {
        if config.directory.is_empty() {
            let temp = tempfile::Builder::new()
                .prefix(&config.temp_prefix)
                .tempdir()?;
            let path = temp.path().to_path_buf();
            logger::log_store_root(&path, true);
            return Ok(Self {
                path,
                temp: Some(temp),
            });
        }

        let path = std::path::absolute(&config.directory)?;
        create_dir_all(&path, config.dir_mode)?;
        logger::log_store_root(&path, false);
        Ok(Self { path, temp: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the root is removed by [`StoreRoot::close`]
    #[cfg(test)]
    pub const fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Release the store root, removing it when temporary
    pub fn close(self) {
        if let Some(temp) = self.temp {
            logger::log_info(&format!("deleting {}", self.path.display()));
            if let Err(e) = temp.close() {
                logger::log_error(&format!(
                    "Failed to remove store root '{}': {e}",
                    self.path.display()
                ));
            }
        }
    }
}

/// Create `path` and its missing parents with `mode` permission bits
fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(directory: &str) -> StorageConfig {
        StorageConfig {
            directory: directory.to_string(),
            temp_prefix: "files".to_string(),
            dir_mode: 0o755,
            max_upload_size: None,
            sync_on_close: false,
        }
    }

    #[test]
    fn test_temporary_root_removed_on_close() {
        let root = StoreRoot::open(&storage("")).unwrap();
        assert!(root.is_temporary());
        let path = root.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("files"));

        std::fs::create_dir_all(path.join("a/b")).unwrap();
        std::fs::write(path.join("a/b/file.txt"), b"hello").unwrap();

        root.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_operator_root_created_and_kept() {
        let parent = tempfile::tempdir().unwrap();
        let dir = parent.path().join("nested/store");

        let root = StoreRoot::open(&storage(&dir.to_string_lossy())).unwrap();
        assert!(!root.is_temporary());
        assert!(root.path().is_absolute());
        assert!(dir.is_dir());

        root.close();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_operator_root_already_exists() {
        let parent = tempfile::tempdir().unwrap();
        let root = StoreRoot::open(&storage(&parent.path().to_string_lossy())).unwrap();
        assert_eq!(root.path(), parent.path());
    }
}
