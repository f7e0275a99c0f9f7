//! Newline framing over a byte stream

use std::io::{self, Error as IoError, ErrorKind};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Lazily splits a byte stream into `\n`-terminated lines.
///
/// The sequence is not restartable: once [`next_line`](Self::next_line) has
/// returned `Ok(None)` or an error, every later call returns `Ok(None)`.
pub struct LineFramer<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_line_length: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_line_length,
            finished: false,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the stream. Bytes after the last
    /// newline are dropped at end of stream. `\r\n` is accepted as a terminator
    /// and invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        self.buf.clear();
        // +2 leaves room for "\r\n" after a maximum-length line
        let limit = (self.max_line_length as u64).saturating_add(2);
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await;

        let n = match read {
            Ok(n) => n,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        if n == 0 {
            self.finished = true;
            return Ok(None);
        }

        if self.buf.last() != Some(&b'\n') {
            self.finished = true;
            if self.buf.len() as u64 >= limit {
                return Err(self.too_long());
            }
            // Unterminated trailing fragment
            return Ok(None);
        }

        self.buf.pop();
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        if self.buf.len() > self.max_line_length {
            self.finished = true;
            return Err(self.too_long());
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn too_long(&self) -> IoError {
        IoError::new(
            ErrorKind::InvalidData,
            format!("line exceeds {} bytes", self.max_line_length),
        )
    }
}
