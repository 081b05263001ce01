//! Tar header construction
//!
//! Entry names keep the leading `/` of the request path, which the `tar`
//! crate's path setters refuse, so names are written into the raw header
//! field. Names that do not fit get a GNU long-name record first.

use std::fs::Metadata;
use std::io::{self, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tar::{Builder, EntryType, Header};

const NAME_FIELD_LEN: usize = 100;
const LONG_NAME_MARKER: &[u8] = b"././@LongLink";

/// Archive name for `path`: its components below `root`, each prefixed by `/`
pub fn entry_name(root: &Path, path: &Path) -> Option<Vec<u8>> {
    let rel = path.strip_prefix(root).ok()?;
    let mut name = Vec::new();
    for component in rel.components() {
        name.push(b'/');
        name.extend_from_slice(&os_bytes(component.as_os_str()));
    }
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(unix)]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    s.to_string_lossy().into_owned().into_bytes()
}

/// Regular-file header carrying the size, permission bits and mtime of `meta`
pub fn file_header(name: &[u8], meta: &Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(meta.len());
    header.set_mode(permission_bits(meta));
    header.set_mtime(mtime_secs(meta));
    header.set_uid(0);
    header.set_gid(0);
    set_raw_name(&mut header, name);
    header.set_cksum();
    header
}

/// Write a GNU long-name record when `name` overflows the header name field
pub fn append_long_name<W: Write>(builder: &mut Builder<W>, name: &[u8]) -> io::Result<()> {
    if name.len() <= NAME_FIELD_LEN {
        return Ok(());
    }
    let mut data = Vec::with_capacity(name.len() + 1);
    data.extend_from_slice(name);
    data.push(0);

    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::GNULongName);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(data.len() as u64);
    set_raw_name(&mut header, LONG_NAME_MARKER);
    header.set_cksum();
    builder.append(&header, data.as_slice())
}

/// Copy `name` into the header name field, truncating when it does not fit
fn set_raw_name(header: &mut Header, name: &[u8]) {
    let field = &mut header.as_old_mut().name;
    field.fill(0);
    let n = name.len().min(field.len());
    field[..n].copy_from_slice(&name[..n]);
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Whole seconds since the Unix epoch, 0 when unavailable or earlier
fn mtime_secs(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}
