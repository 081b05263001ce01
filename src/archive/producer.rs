//! Walk-driven tar producer
//!
//! Visits a subtree depth-first in lexical order and appends one entry per
//! regular file. Bytes leave as soon as they are produced; an error part
//! way through leaves the already-sent prefix in place.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tar::Builder;
use walkdir::WalkDir;

use super::header::{append_long_name, entry_name, file_header};
use super::ArchiveError;
use crate::logger;

/// Totals for one archive run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: u64,
    pub content_bytes: u64,
}

/// Streams the regular files below one directory as a tar archive
pub struct ArchiveProducer<'a> {
    /// Entry names are taken relative to this directory
    root: &'a Path,
    /// Directory being archived, at or below `root`
    target: PathBuf,
}

impl<'a> ArchiveProducer<'a> {
    pub const fn new(root: &'a Path, target: PathBuf) -> Self {
        Self { root, target }
    }

    /// Append every regular file below the target to `builder`
    ///
    /// A missing target, or one that is not a directory, yields no entries.
    /// The first file that cannot be opened, statted or copied stops the
    /// walk; entries already appended stay in the stream.
    pub fn append_all<W: Write>(
        &self,
        builder: &mut Builder<W>,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let mut summary = ArchiveSummary::default();
        if !fs::metadata(&self.target).is_ok_and(|m| m.is_dir()) {
            return Ok(summary);
        }

        let walker = WalkDir::new(&self.target)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(
                        || self.target.display().to_string(),
                        |p| p.display().to_string(),
                    );
                    logger::log_warning(&format!("Skipping '{path}' during archive walk: {e}"));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() || !(file_type.is_file() || links_to_file(entry.path())) {
                continue;
            }

            let size = self.append_file(builder, entry.path())?;
            summary.entries += 1;
            summary.content_bytes += size;
        }
        Ok(summary)
    }

    /// Append one file: long-name record if needed, header, exactly `size`
    /// bytes of content
    fn append_file<W: Write>(
        &self,
        builder: &mut Builder<W>,
        path: &Path,
    ) -> Result<u64, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let meta = file.metadata().map_err(|source| ArchiveError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(name) = entry_name(self.root, path) else {
            return Err(ArchiveError::Stat {
                path: path.to_path_buf(),
                source: io::Error::other("path is outside the store root"),
            });
        };

        let header = file_header(&name, &meta);
        let size = meta.len();
        let copy_err = |source| ArchiveError::Copy {
            path: path.to_path_buf(),
            source,
        };
        append_long_name(builder, &name).map_err(copy_err)?;
        builder
            .append(&header, ExactReader::new(file, size))
            .map_err(copy_err)?;
        Ok(size)
    }
}

/// True when `path` is a symlink that resolves to a regular file, or one
/// whose target cannot be determined (opening it reports the failure)
fn links_to_file(path: &Path) -> bool {
    fs::metadata(path).map_or(true, |m| m.is_file())
}

/// Yields exactly `len` bytes from `inner`
///
/// Bytes past `len` are ignored; running dry early is an `UnexpectedEof`
/// error, since the header already promised `len` bytes.
struct ExactReader<R> {
    inner: io::Take<R>,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner: inner.take(len),
            remaining: len,
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank, {} bytes missing", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn archive(root: &Path, target: PathBuf) -> (Result<ArchiveSummary, ArchiveError>, Vec<u8>) {
        let mut builder = Builder::new(Vec::new());
        let result = ArchiveProducer::new(root, target).append_all(&mut builder);
        (result, builder.into_inner().unwrap())
    }

    fn read_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (name, data)
            })
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a/b/file.txt", b"hello");
        write_file(dir.path(), "a/z.bin", &[7u8; 1500]);
        write_file(dir.path(), "a/c/empty", b"");
        write_file(dir.path(), "top.txt", b"top");
        fs::create_dir_all(dir.path().join("a/no_files/deeper")).unwrap();
        dir
    }

    #[test]
    fn test_archive_round_trip() {
        let dir = sample_tree();
        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        let summary = result.unwrap();
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.content_bytes, 5 + 1500 + 3);

        let entries: BTreeMap<_, _> = read_entries(&bytes).into_iter().collect();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries["/a/b/file.txt"], b"hello");
        assert_eq!(entries["/a/z.bin"], vec![7u8; 1500]);
        assert_eq!(entries["/a/c/empty"], b"");
        assert_eq!(entries["/top.txt"], b"top");
    }

    #[test]
    fn test_walk_order_is_lexical_depth_first() {
        let dir = sample_tree();
        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        result.unwrap();

        let names: Vec<_> = read_entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["/a/b/file.txt", "/a/c/empty", "/a/z.bin", "/top.txt"]
        );
    }

    #[test]
    fn test_subtree_names_relative_to_root() {
        let dir = sample_tree();
        let (result, bytes) = archive(dir.path(), dir.path().join("a/b"));
        assert_eq!(result.unwrap().entries, 1);

        let entries = read_entries(&bytes);
        assert_eq!(entries, vec![("/a/b/file.txt".to_string(), b"hello".to_vec())]);
    }

    #[test]
    fn test_header_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "f", b"12345");
        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        result.unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        let header = entry.header();
        assert_eq!(header.size().unwrap(), 5);
        assert_eq!(header.entry_type(), tar::EntryType::Regular);
        assert!(header.mtime().unwrap() > 0);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join("f")).unwrap().permissions().mode();
            assert_eq!(header.mode().unwrap(), mode & 0o7777);
        }
    }

    #[test]
    fn test_missing_target_is_trailer_only() {
        let dir = tempfile::tempdir().unwrap();
        let (result, bytes) = archive(dir.path(), dir.path().join("nonexistent"));
        assert_eq!(result.unwrap(), ArchiveSummary::default());
        assert_eq!(bytes, vec![0u8; 1024]);
    }

    #[test]
    fn test_file_target_is_trailer_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "plain.txt", b"data");
        let (result, bytes) = archive(dir.path(), dir.path().join("plain.txt"));
        assert_eq!(result.unwrap().entries, 0);
        assert_eq!(bytes, vec![0u8; 1024]);
    }

    #[test]
    fn test_empty_directories_produce_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y/z")).unwrap();
        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        assert_eq!(result.unwrap().entries, 0);
        assert_eq!(bytes, vec![0u8; 1024]);
    }

    #[test]
    fn test_long_names_survive() {
        let dir = tempfile::tempdir().unwrap();
        let rel = format!("{}/{}/data.bin", "d".repeat(80), "e".repeat(80));
        write_file(dir.path(), &rel, b"long");
        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        result.unwrap();

        let entries = read_entries(&bytes);
        assert_eq!(entries, vec![(format!("/{rel}"), b"long".to_vec())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "real/file.txt", b"target");
        std::os::unix::fs::symlink(dir.path().join("real/file.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linkdir")).unwrap();

        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        assert_eq!(result.unwrap().entries, 2);
        let names: Vec<_> = read_entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["/link.txt", "/real/file.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_aborts_walk() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", b"first");
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("b.txt")).unwrap();
        write_file(dir.path(), "c.txt", b"never");

        let (result, bytes) = archive(dir.path(), dir.path().to_path_buf());
        assert!(matches!(result, Err(ArchiveError::Open { .. })));

        // The entry before the failure is intact and followed by the trailer
        let entries = read_entries(&bytes);
        assert_eq!(entries, vec![("/a.txt".to_string(), b"first".to_vec())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifos_skipped_without_opening() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", b"plain");
        let status = std::process::Command::new("mkfifo")
            .arg(dir.path().join("pipe"))
            .status()
            .unwrap();
        assert!(status.success());
        std::os::unix::fs::symlink(dir.path().join("pipe"), dir.path().join("pipe_link")).unwrap();

        // Opening a fifo with no writer blocks, so run the walk off-thread
        let root = dir.path().to_path_buf();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let (result, bytes) = archive(&root, root.clone());
            let _ = tx.send((result.map(|s| s.entries).ok(), bytes));
        });
        let (entries, bytes) = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("walk blocked on a fifo");

        assert_eq!(entries, Some(1));
        assert_eq!(
            read_entries(&bytes),
            vec![("/a.txt".to_string(), b"plain".to_vec())]
        );
    }

    #[test]
    fn test_exact_reader_short_source() {
        let mut reader = ExactReader::new(&b"abc"[..], 5);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_exact_reader_ignores_growth() {
        let mut reader = ExactReader::new(&b"abcdef"[..], 4);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcd");
    }
}
