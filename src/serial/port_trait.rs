//! Trait abstraction for link I/O to enable testing

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::error::LinkError;

/// Receiving side of the link
#[async_trait]
pub trait ByteSource: Send {
    /// Read the next byte, waiting as long as it takes
    async fn read_byte(&mut self) -> Result<u8, LinkError>;
}

/// Transmitting side of the link
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSink: Send {
    /// Write a complete line (including its `\n`) and flush it
    async fn write_line(&mut self, line: &str) -> Result<(), LinkError>;
}

/// Buffered reader half of a link
pub struct LinkReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead> LinkReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for LinkReader<R> {
    async fn read_byte(&mut self) -> Result<u8, LinkError> {
        match self.inner.read_u8().await {
            Ok(byte) => Ok(byte),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(LinkError::Closed),
            Err(e) => Err(LinkError::Read(e)),
        }
    }
}

/// Writer half of a link
pub struct LinkWriter<W> {
    inner: W,
}

impl<W> LinkWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for LinkWriter<W> {
    async fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.inner
            .write_all(line.as_bytes())
            .await
            .map_err(LinkError::Write)?;
        self.inner.flush().await.map_err(LinkError::Write)
    }
}

/// Split a duplex stream into independently owned reader and writer halves
///
/// The underlying stream is closed once both halves are dropped.
pub fn split_stream<S>(stream: S) -> (LinkReader<ReadHalf<S>>, LinkWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (LinkReader::new(read_half), LinkWriter::new(write_half))
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Byte source that plays back a script
    ///
    /// When the script runs out it either reports the link closed or hangs
    /// like a silent serial line.
    pub struct ScriptedSource {
        bytes: VecDeque<u8>,
        hang_at_end: bool,
    }

    impl ScriptedSource {
        pub fn closing(script: &[u8]) -> Self {
            Self {
                bytes: script.iter().copied().collect(),
                hang_at_end: false,
            }
        }

        pub fn hanging(script: &[u8]) -> Self {
            Self {
                bytes: script.iter().copied().collect(),
                hang_at_end: true,
            }
        }
    }

    #[async_trait]
    impl ByteSource for ScriptedSource {
        async fn read_byte(&mut self) -> Result<u8, LinkError> {
            match self.bytes.pop_front() {
                Some(byte) => Ok(byte),
                None if self.hang_at_end => std::future::pending::<Result<u8, LinkError>>().await,
                None => Err(LinkError::Closed),
            }
        }
    }

    /// Line sink that records everything written to it
    #[derive(Clone)]
    pub struct RecordingSink {
        pub written: Arc<Mutex<Vec<String>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                written: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn lines(&self) -> Vec<String> {
            self.written.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: Option<io::ErrorKind>) {
            *self.write_error.lock().unwrap() = error;
        }
    }

    #[async_trait]
    impl LineSink for RecordingSink {
        async fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(LinkError::Write(io::Error::new(error, "Mock write error")));
            }
            self.written.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }
}
