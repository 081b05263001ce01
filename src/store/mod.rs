//! Store root module
//!
//! Owns the on-disk root directory, maps request paths onto it and
//! coordinates concurrent writers.

mod locks;
mod path;
mod root;

pub use locks::UploadLocks;
pub use path::RequestPath;
pub use root::StoreRoot;
