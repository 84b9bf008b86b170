//! Newline-delimited text I/O over a byte stream.
//!
//! A [`LineChannel`] is split into a [`LineReader`], owned by whichever task
//! receives, and a [`LineWriter`] that can be cloned into every task that
//! sends. Lines are UTF-8, terminated by a single `\n`, and carry no length
//! prefix or escaping.

use std::sync::Arc;

use tokio::{
    io::{
        AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
        WriteHalf,
    },
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use crate::error::ChannelError;

const DELIMITER: u8 = b'\n';

pub struct LineChannel<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl LineChannel<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_tcp(stream: TcpStream, max_line_bytes: usize) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_halves(reader, writer, max_line_bytes)
    }
}

impl<S> LineChannel<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wraps any bidirectional stream, e.g. a `tokio::io::duplex` pipe.
    pub fn new(stream: S, max_line_bytes: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_halves(reader, writer, max_line_bytes)
    }
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn from_halves(reader: R, writer: W, max_line_bytes: usize) -> Self {
        Self {
            reader: LineReader::new(reader, max_line_bytes),
            writer: LineWriter::new(writer),
        }
    }

    pub fn split(self) -> (LineReader<R>, LineWriter<W>) {
        (self.reader, self.writer)
    }
}

pub struct LineReader<R> {
    inner: BufReader<R>,
    max_line_bytes: usize,
    pending: Vec<u8>,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max_line_bytes,
            pending: Vec::new(),
        }
    }

    /// Reads the next line without its trailing `\n`.
    ///
    /// Returns `Ok(None)` when the peer closed the stream on a line boundary.
    /// Bytes of an unfinished line are kept across calls, so dropping this
    /// future inside `select!` loses nothing.
    pub async fn read_line(&mut self) -> Result<Option<String>, ChannelError> {
        // One byte past the limit is enough to tell an overlong line apart.
        let budget = self
            .max_line_bytes
            .saturating_add(1)
            .saturating_sub(self.pending.len()) as u64;
        let read = (&mut self.inner)
            .take(budget)
            .read_until(DELIMITER, &mut self.pending)
            .await;

        let read = match read {
            Ok(read) => read,
            Err(err) => {
                self.pending.clear();
                return Err(err.into());
            }
        };

        if self.pending.last() == Some(&DELIMITER) {
            self.pending.pop();
            let line = std::mem::take(&mut self.pending);
            return Ok(Some(String::from_utf8(line)?));
        }

        if self.pending.len() > self.max_line_bytes {
            self.pending.clear();
            return Err(ChannelError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        self.pending.clear();
        Err(ChannelError::Truncated)
    }
}

/// Write half of a channel. Clones share the underlying stream.
pub struct LineWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for LineWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> LineWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Sends `text` followed by `\n` as one contiguous write.
    pub async fn write_line(&self, text: &str) -> Result<(), ChannelError> {
        if text.contains(DELIMITER as char) {
            return Err(ChannelError::EmbeddedNewline);
        }

        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(DELIMITER);

        let mut writer = self.inner.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        let mut writer = self.inner.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn reads_lines_split_across_writes() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();

        remote.write_all(b"HEL").await.expect("first chunk");
        remote.write_all(b"LO\nCLOSE\n").await.expect("second chunk");

        assert_eq!(reader.read_line().await.expect("read"), Some("HELLO".into()));
        assert_eq!(reader.read_line().await.expect("read"), Some("CLOSE".into()));
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();
        drop(remote);

        assert_eq!(reader.read_line().await.expect("read"), None);
    }

    #[tokio::test]
    async fn eof_mid_line_is_truncation() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();
        remote.write_all(b"HELL").await.expect("write");
        drop(remote);

        let err = reader.read_line().await.expect_err("partial line");
        assert!(matches!(err, ChannelError::Truncated));
        assert!(err.is_peer_gone());
    }

    #[tokio::test]
    async fn carriage_return_is_preserved() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();
        remote.write_all(b"HELLO\r\n").await.expect("write");

        assert_eq!(reader.read_line().await.expect("read"), Some("HELLO\r".into()));
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted_and_longer_is_rejected() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 4).split();
        remote.write_all(b"abcd\nabcde\n").await.expect("write");

        assert_eq!(reader.read_line().await.expect("read"), Some("abcd".into()));
        let err = reader.read_line().await.expect_err("too long");
        assert!(matches!(err, ChannelError::LineTooLong { limit: 4 }));
    }

    #[tokio::test]
    async fn largest_limit_still_reads_lines() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, usize::MAX).split();
        remote.write_all(b"HELLO\nCLOSE\n").await.expect("write");
        drop(remote);

        assert_eq!(reader.read_line().await.expect("read"), Some("HELLO".into()));
        assert_eq!(reader.read_line().await.expect("read"), Some("CLOSE".into()));
        assert_eq!(reader.read_line().await.expect("read"), None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_reported() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();
        remote.write_all(&[0xff, 0xfe, b'\n']).await.expect("write");

        let err = reader.read_line().await.expect_err("bad utf8");
        assert!(matches!(err, ChannelError::InvalidUtf8(_)));
    }

    #[tokio::test]
    async fn multibyte_text_survives() {
        let (mut remote, local) = duplex(64);
        let (mut reader, _writer) = LineChannel::new(local, 1024).split();
        remote.write_all("MSG grüße\n".as_bytes()).await.expect("write");

        assert_eq!(
            reader.read_line().await.expect("read"),
            Some("MSG grüße".into())
        );
    }

    #[tokio::test]
    async fn write_line_appends_a_single_newline() {
        let (mut remote, local) = duplex(64);
        let (_reader, writer) = LineChannel::new(local, 1024).split();

        writer.write_line("CLOSE CONFIRM").await.expect("write");
        writer.shutdown().await.expect("shutdown");

        let mut received = String::new();
        remote.read_to_string(&mut received).await.expect("read");
        assert_eq!(received, "CLOSE CONFIRM\n");
    }

    #[tokio::test]
    async fn write_line_rejects_embedded_newlines() {
        let (_remote, local) = duplex(64);
        let (_reader, writer) = LineChannel::new(local, 1024).split();

        let err = writer.write_line("HELLO\nCLOSE").await.expect_err("rejected");
        assert!(matches!(err, ChannelError::EmbeddedNewline));
    }

    #[tokio::test]
    async fn concurrent_writers_never_interleave_within_a_line() {
        let (remote, local) = duplex(256);
        let (_reader, writer) = LineChannel::new(local, 1024).split();
        let mut remote = LineReader::new(remote, 1024);

        let first = "a".repeat(200);
        let second = "b".repeat(200);
        let tasks = [first.clone(), second.clone()].map(|text| {
            let writer = writer.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    writer.write_line(&text).await.expect("write");
                }
            })
        });

        let mut seen = 0;
        while seen < 20 {
            let line = remote.read_line().await.expect("read").expect("line");
            assert!(line == first || line == second, "interleaved line: {line}");
            seen += 1;
        }

        for task in tasks {
            task.await.expect("writer task");
        }
    }
}
