//! Streaming tar archives of store subtrees
//!
//! The walk runs on the blocking pool and writes through a [`ChunkSink`]
//! into a bounded channel that backs the GET response body. Nothing is
//! buffered beyond the channel, so the status line goes out before the walk
//! is known to succeed and a failure can only cut the stream short.

mod header;
mod producer;
mod sink;

use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Builder;
use tokio::sync::mpsc;

use crate::config::ArchiveConfig;
use crate::logger;

use producer::ArchiveProducer;
pub use sink::BodyFrame;
use sink::ChunkSink;

/// Per-file failures that stop a walk
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Could not open file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not get stat for file '{}': {source}", path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not copy the file '{}' data to the tarball: {source}", path.display())]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// True when the failing entry was partly written to the stream
    pub const fn is_mid_entry(&self) -> bool {
        matches!(self, Self::Copy { .. })
    }
}

/// Start archiving `target` in the background
///
/// Returns the receiving end of the body channel. Dropping it (client gone)
/// makes the next write fail, which stops the walk.
pub fn spawn(
    root: PathBuf,
    target: PathBuf,
    label: String,
    config: &ArchiveConfig,
) -> mpsc::Receiver<BodyFrame> {
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let sink = ChunkSink::new(tx, config.chunk_size, config.max_archive_size);
    tokio::task::spawn_blocking(move || write_archive(&root, target, sink, &label));
    rx
}

/// Archive `target` into `sink`, then close the stream
///
/// The trailer follows a completed walk, or one stopped before the failing
/// file's header went out. After a mid-entry failure the body ends with an
/// error frame where the failure happened, so the transfer is aborted even
/// when the cut falls on a block boundary.
fn write_archive(root: &Path, target: PathBuf, sink: ChunkSink, label: &str) {
    let mut builder = Builder::new(sink);
    let result = ArchiveProducer::new(root, target).append_all(&mut builder);

    match &result {
        Ok(summary) => logger::log_info(&format!(
            "[Archive] {label}: {} entries, {} bytes of content, {} bytes streamed",
            summary.entries,
            summary.content_bytes,
            builder.get_ref().written()
        )),
        Err(e) => {
            logger::log_error(&format!("[Archive] {label}: {e}"));
            if e.is_mid_entry() {
                builder.get_mut().abort(std::io::Error::other(e.to_string()));
            }
        }
    }

    let closed = builder.into_inner().and_then(|mut sink| sink.flush());
    if let Err(e) = closed {
        if result.is_ok() {
            logger::log_error(&format!("[Archive] {label}: failed to close stream: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Run a walk to completion; returns the streamed bytes and the error
    /// frame that ended the body, if any
    fn run(
        root: &Path,
        target: PathBuf,
        chunk_size: usize,
        limit: Option<u64>,
    ) -> (Vec<u8>, Option<std::io::Error>) {
        let (tx, mut rx) = mpsc::channel(1024);
        let sink = ChunkSink::new(tx, chunk_size, limit);
        let root = root.to_path_buf();
        std::thread::spawn(move || write_archive(&root, target, sink, "/test"))
            .join()
            .unwrap();

        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            match frame {
                Ok(frame) => out.extend_from_slice(&frame.into_data().unwrap()),
                Err(e) => {
                    assert!(rx.try_recv().is_err(), "frames after the error");
                    return (out, Some(e));
                }
            }
        }
        (out, None)
    }

    fn collect(root: &Path, target: PathBuf, chunk_size: usize, limit: Option<u64>) -> Vec<u8> {
        let (bytes, err) = run(root, target, chunk_size, limit);
        assert!(err.is_none(), "unexpected error frame: {err:?}");
        bytes
    }

    #[test]
    fn test_stream_matches_archive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/file.txt"), b"hello").unwrap();

        let bytes = collect(dir.path(), dir.path().join("a"), 100, None);
        // header + one padded data block + trailer
        assert_eq!(bytes.len(), 512 + 512 + 1024);

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("/a/b/file.txt"));
        assert_eq!(entry.header().size().unwrap(), 5);
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_missing_target_streams_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = collect(dir.path(), dir.path().join("nonexistent"), 4096, None);
        assert_eq!(bytes, vec![0u8; 1024]);
    }

    #[test]
    fn test_mid_entry_failure_omits_trailer() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.bin"), vec![1u8; 1500]).unwrap();

        let (bytes, err) = run(dir.path(), dir.path().to_path_buf(), 4096, Some(1000));
        assert!(err.is_some());
        // Only the header made it out; no padding and no trailer follow
        assert_eq!(bytes.len(), 512);

        let header = tar::Header::from_byte_slice(&bytes);
        assert_eq!(header.size().unwrap(), 1500);
        assert_eq!(&*header.path_bytes(), b"/big.bin");
    }

    #[test]
    fn test_limit_between_entries_ends_with_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"first").unwrap();
        fs::write(dir.path().join("b.txt"), b"second").unwrap();

        // Room for exactly one header and one data block
        let (bytes, err) = run(dir.path(), dir.path().to_path_buf(), 4096, Some(1024));
        assert_eq!(bytes.len(), 1024);
        let err = err.expect("the cut must be reported in the body");
        assert!(err.to_string().contains("/b.txt"), "{err}");

        // The bytes alone look like a clean end on a block boundary
        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["/a.txt"]);
    }

    #[test]
    fn test_open_failure_keeps_trailer_without_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"first").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("b.txt")).unwrap();

        let (bytes, err) = run(dir.path(), dir.path().to_path_buf(), 4096, None);
        assert!(err.is_none());
        assert_eq!(bytes.len(), 512 + 512 + 1024);
    }

    #[test]
    fn test_archive_error_classification() {
        let io = || std::io::Error::other("boom");
        let path = PathBuf::from("/x");
        assert!(!ArchiveError::Open { path: path.clone(), source: io() }.is_mid_entry());
        assert!(!ArchiveError::Stat { path: path.clone(), source: io() }.is_mid_entry());
        assert!(ArchiveError::Copy { path, source: io() }.is_mid_entry());
    }
}
