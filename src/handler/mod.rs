//! Request handler module
//!
//! Dispatches requests by method to the archive download or the upload
//! receiver.

pub mod download;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
