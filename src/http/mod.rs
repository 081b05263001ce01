//! HTTP protocol layer module
//!
//! Response body type and status builders shared by the handlers.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_400_response, build_413_response, build_500_response, build_ok_response,
    build_tar_stream_response, ResponseBody,
};
