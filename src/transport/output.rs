//! Shared write side of a client connection

use std::fmt;
use std::io::{self, Error as IoError, ErrorKind};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cloneable handle to one client's output stream.
///
/// Writes and close are serialized by an async lock, so a line is always
/// written whole. After [`close`](Self::close) every write fails with
/// `NotConnected`.
#[derive(Clone)]
pub struct OutputHandle {
    writer: Arc<Mutex<Option<BoxedWriter>>>,
}

impl OutputHandle {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Arc::new(Mutex::new(Some(Box::new(writer)))),
        }
    }

    /// Write one complete line and flush it
    pub async fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| IoError::new(ErrorKind::NotConnected, "output closed"))?;

        writer.write_all(line).await?;
        writer.flush().await
    }

    /// Shut the stream down. Idempotent.
    pub async fn close(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            // Peer may already be gone
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }

    /// Whether two handles share the same underlying stream
    pub fn same_stream(&self, other: &OutputHandle) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle").finish_non_exhaustive()
    }
}
