//! Blocking writer that feeds an HTTP response body
//!
//! The tar builder writes into a [`ChunkSink`] from a blocking thread; full
//! chunks are handed to the connection task over a bounded channel, so a
//! slow client applies backpressure to the walk.

use hyper::body::{Bytes, Frame};
use std::io::{self, Write};
use tokio::sync::mpsc;

/// Item type carried from the walk to the response body
pub type BodyFrame = Result<Frame<Bytes>, io::Error>;

pub struct ChunkSink {
    tx: mpsc::Sender<BodyFrame>,
    buf: Vec<u8>,
    chunk_size: usize,
    limit: Option<u64>,
    written: u64,
    sealed: bool,
}

impl ChunkSink {
    pub fn new(tx: mpsc::Sender<BodyFrame>, chunk_size: usize, limit: Option<u64>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
            limit,
            written: 0,
            sealed: false,
        }
    }

    /// End the stream with an error after what has been accepted so far
    ///
    /// Pending bytes go out first, then `reason` as an error frame so the
    /// connection aborts the body instead of finishing it. Everything written
    /// afterwards is discarded.
    pub fn abort(&mut self, reason: io::Error) {
        if self.sealed {
            return;
        }
        self.sealed = true;
        if self.send_buffered().is_ok() {
            // A closed receiver means the client is already gone
            let _ = self.tx.blocking_send(Err(reason));
        }
    }

    /// Bytes accepted into the stream
    pub const fn written(&self) -> u64 {
        self.written
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(self.chunk_size),
        ));
        self.tx
            .blocking_send(Ok(Frame::data(chunk)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl Write for ChunkSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.sealed {
            return Ok(data.len());
        }
        if let Some(limit) = self.limit {
            if self.written + data.len() as u64 > limit {
                return Err(io::Error::other(format!(
                    "archive exceeds size limit of {limit} bytes"
                )));
            }
        }

        let room = self.chunk_size - self.buf.len();
        let n = data.len().min(room);
        self.buf.extend_from_slice(&data[..n]);
        self.written += n as u64;
        if self.buf.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
