//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method check, path decoding and
//! dispatch to the download or upload handler.

use crate::config::AppState;
use crate::handler::{download, upload};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use crate::store::RequestPath;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
///
/// The request (and its body) is owned here and released when the handler
/// returns, whatever the outcome.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let mut entry = state
        .access_log()
        .then(|| access_entry(&req, peer_addr));

    let (response, stored_bytes) = dispatch(req, &state).await;

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.stored_bytes = stored_bytes;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Route by method; returns the response and the number of bytes stored
async fn dispatch(req: Request<Incoming>, state: &AppState) -> (Response<ResponseBody>, u64) {
    let method = req.method().clone();
    if method != Method::GET && method != Method::POST {
        logger::log_warning(&format!("Method not allowed: {method}"));
        return (http::build_400_response(), 0);
    }

    let path = match RequestPath::parse(req.uri().path()) {
        Ok(path) => path,
        Err(e) => {
            logger::log_warning(&format!("Bad request path '{}': {e}", req.uri().path()));
            return (http::build_400_response(), 0);
        }
    };

    if method == Method::GET {
        return (download::serve_archive(state, &path), 0);
    }

    let content_length = content_length(&req);
    match upload::receive(state, &path, content_length, req.into_body()).await {
        Ok(n) => (http::build_ok_response(), n),
        Err(e) => {
            logger::log_error(&e.to_string());
            let response = match e.status() {
                413 => http::build_413_response(),
                _ => http::build_500_response(),
            };
            (response, 0)
        }
    }
}

/// Declared body size, if present and well-formed
fn content_length(req: &Request<Incoming>) -> Option<u64> {
    req.headers()
        .get(hyper::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn access_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.user_agent = req
        .headers()
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry
}
