//! Archive download
//!
//! A GET streams the subtree named by the request path. The response head
//! is sent before the walk starts, so the status is always 200.

use hyper::Response;

use crate::archive;
use crate::config::AppState;
use crate::http::{self, ResponseBody};
use crate::store::RequestPath;

/// Start streaming `path` as a tar archive
pub fn serve_archive(state: &AppState, path: &RequestPath) -> Response<ResponseBody> {
    let target = path.resolve(&state.root);
    let rx = archive::spawn(
        state.root.clone(),
        target,
        path.to_string(),
        &state.config.archive,
    );
    http::build_tar_stream_response(rx)
}
