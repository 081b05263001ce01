//! HTTP response building module
//!
//! Status-only responses for the upload and error paths, and the streamed
//! tar response for archive requests.

use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, StreamBody};
use hyper::body::Bytes;
use hyper::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::archive::BodyFrame;

/// Body type of every response: either empty or a streamed archive
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// An empty body
pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build 200 OK with no body
pub fn build_ok_response() -> Response<ResponseBody> {
    build_status_response(200)
}

/// Build 400 Bad Request with no body
pub fn build_400_response() -> Response<ResponseBody> {
    build_status_response(400)
}

/// Build 413 Payload Too Large with no body
pub fn build_413_response() -> Response<ResponseBody> {
    build_status_response(413)
}

/// Build 500 Internal Server Error with no body
pub fn build_500_response() -> Response<ResponseBody> {
    build_status_response(500)
}

/// Build 200 OK whose body is fed by an archive walk
///
/// The status is committed here; whatever the walk does afterwards can only
/// end the body early.
pub fn build_tar_stream_response(rx: mpsc::Receiver<BodyFrame>) -> Response<ResponseBody> {
    let body = StreamBody::new(ReceiverStream::new(rx)).boxed_unsync();
    Response::builder()
        .status(200)
        .header("Content-Type", "application/x-tar")
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(empty_body())
        })
}

fn build_status_response(status: u16) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Length", 0)
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(empty_body())
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
