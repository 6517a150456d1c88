//! Wire framing: CRLF line I/O, dot-terminated blocks
//! ([RFC 3977 §3.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-3.1.1)),
//! and MIME header reading with folding and canonicalisation.

use std::io;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

use crate::error::{Error, NntpError, Result};
use crate::model::{Body, Headers};

/// Anything the engine can drive a session over: TCP streams in production,
/// duplex pipes in tests.
pub trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> NntpIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// One client connection, split into a buffered line reader and a writer.
pub struct Conn<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: NntpIo> Conn<S> {
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read one request line, stripped of its CRLF. `Disconnected` on EOF.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(Error::Disconnected);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Write a single CRLF-terminated response line.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await
    }

    /// Start a dot-terminated block. The caller has already written the
    /// intro line and must `close` the block after the last payload line.
    pub fn dot_writer(&mut self) -> DotWriter<'_, S> {
        DotWriter { conn: self }
    }

    /// Read a dot-terminated block from the client, unstuffing leading dots
    /// and normalising line endings to `\n`.
    pub async fn read_dot_block(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let bytes = self.reader.read_until(b'\n', &mut line).await?;
            if bytes == 0 {
                return Err(Error::Disconnected);
            }
            trim_line_ending(&mut line);
            if line == b"." {
                return Ok(body);
            }
            let payload = match line.split_first() {
                Some((&b'.', rest)) => rest,
                _ => &line[..],
            };
            body.extend_from_slice(payload);
            body.push(b'\n');
        }
    }

    /// Read MIME headers up to the blank separator line. Continuation lines
    /// (leading whitespace) fold into the previous value; names are
    /// canonicalised as they are stored.
    pub async fn read_mime_header(&mut self) -> Result<Headers> {
        let mut headers = Headers::new();
        let mut pending: Option<(String, String)> = None;
        loop {
            let line = self.read_line().await?;
            if line.starts_with(' ') || line.starts_with('\t') {
                match &mut pending {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => return Err(NntpError::SYNTAX.into()),
                }
                continue;
            }
            if let Some((name, value)) = pending.take() {
                headers.append(&name, value);
            }
            if line.is_empty() {
                return Ok(headers);
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(NntpError::SYNTAX.into());
            };
            pending = Some((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

/// Writer for the payload of a dot-terminated block. Lines starting with `.`
/// are stuffed on the way out; `close` writes the lone-dot terminator.
pub struct DotWriter<'a, S> {
    conn: &'a mut Conn<S>,
}

impl<S: NntpIo> DotWriter<'_, S> {
    pub async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        if line.first() == Some(&b'.') {
            self.conn.writer.write_all(b".").await?;
        }
        self.conn.writer.write_all(line).await?;
        self.conn.writer.write_all(b"\r\n").await
    }

    pub async fn write_str(&mut self, line: &str) -> io::Result<()> {
        self.write_line(line.as_bytes()).await
    }

    /// Copy an article body into the block, one line at a time. A final line
    /// without a terminator still goes out as a full line.
    pub async fn copy_body(&mut self, body: Body) -> io::Result<()> {
        let mut reader = BufReader::new(body);
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            let bytes = reader.read_until(b'\n', &mut line).await?;
            if bytes == 0 {
                return Ok(());
            }
            trim_line_ending(&mut line);
            self.write_line(&line).await?;
        }
    }

    /// Terminate the block.
    pub async fn close(self) -> io::Result<()> {
        self.conn.writer.write_all(b".\r\n").await
    }
}

fn trim_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}
