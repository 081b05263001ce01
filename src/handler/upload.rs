//! Upload receiver
//!
//! Writes a request body to the file named by the request path, creating
//! parent directories on the way. Any failure after the file was created
//! leaves the outcome unknown to the client: the file may hold some, all or
//! none of the body.

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::config::{AppState, StorageConfig};
use crate::logger;
use crate::store::RequestPath;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Could not create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not create file '{}': {source}", path.display())]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not read request body for '{}': {source}", path.display())]
    ReadBody { path: PathBuf, source: BoxError },
    #[error("Could not write file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not close file '{}': {source}", path.display())]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },
}

impl UploadError {
    /// Status reported to the client
    pub const fn status(&self) -> u16 {
        match self {
            Self::TooLarge { .. } => 413,
            _ => 500,
        }
    }
}

/// Store `body` at `path` under the store root, returning the bytes written
///
/// `content_length` is the declared body size, checked against the upload
/// limit before the filesystem is touched.
pub async fn receive<B>(
    state: &AppState,
    path: &RequestPath,
    content_length: Option<u64>,
    body: B,
) -> Result<u64, UploadError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    let storage = &state.config.storage;
    if let (Some(limit), Some(len)) = (storage.max_upload_size, content_length) {
        if len > limit {
            return Err(UploadError::TooLarge { limit });
        }
    }

    let target = path.resolve(&state.root);
    let _guard = state.upload_locks.acquire(&target).await;

    if let Some(parent) = target.parent() {
        create_parent_dirs(parent, storage.dir_mode).await?;
    }

    let mut file = File::create(&target)
        .await
        .map_err(|source| UploadError::CreateFile {
            path: target.clone(),
            source,
        })?;

    let copied = copy_body(&mut file, body, &target, storage.max_upload_size).await;
    let closed = close_file(file, &target, storage).await;

    match (copied, closed) {
        (Ok(n), Ok(())) => Ok(n),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), _) => {
            if matches!(e, UploadError::TooLarge { .. }) {
                if let Err(remove_err) = fs::remove_file(&target).await {
                    logger::log_warning(&format!(
                        "Could not remove oversized upload '{}': {remove_err}",
                        target.display()
                    ));
                }
            }
            Err(e)
        }
    }
}

async fn create_parent_dirs(parent: &Path, mode: u32) -> Result<(), UploadError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(parent)
        .await
        .map_err(|source| UploadError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })
}

/// Copy every data frame of `body` into `file`
async fn copy_body<B>(
    file: &mut File,
    mut body: B,
    target: &Path,
    limit: Option<u64>,
) -> Result<u64, UploadError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    let mut written: u64 = 0;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| UploadError::ReadBody {
            path: target.to_path_buf(),
            source: e.into(),
        })?;
        let Ok(data) = frame.into_data() else {
            continue;
        };

        written += data.len() as u64;
        if let Some(limit) = limit {
            if written > limit {
                return Err(UploadError::TooLarge { limit });
            }
        }
        file.write_all(&data)
            .await
            .map_err(|source| UploadError::Write {
                path: target.to_path_buf(),
                source,
            })?;
    }
    Ok(written)
}

/// Flush and fsync (unless disabled) then release the handle
async fn close_file(
    mut file: File,
    target: &Path,
    storage: &StorageConfig,
) -> Result<(), UploadError> {
    let close_err = |source| UploadError::Close {
        path: target.to_path_buf(),
        source,
    };
    file.flush().await.map_err(close_err)?;
    if storage.sync_on_close {
        file.sync_all().await.map_err(close_err)?;
    }
    drop(file);
    Ok(())
}
