use async_trait::async_trait;
use framepipe_transport::{PipeConfig, PipeRead, DEFAULT_CHUNK_SIZE};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PipeError, Result};

/// Consumer side of an inbound pipe.
#[async_trait]
pub trait PipeSink: Send {
    /// Adopt the owning argument's config before the transfer starts.
    fn configure(&mut self, _config: &PipeConfig) {}

    /// Read from `stream` until end-of-data.
    ///
    /// Returns [`PipeError::Cancelled`] when `token` fires between reads.
    async fn read(&mut self, stream: &mut dyn PipeRead, token: &CancellationToken) -> Result<()>;
}

/// Copies everything the subprocess writes into an async writer.
pub struct StreamSink<W> {
    writer: W,
    chunk_size: usize,
    chunk_size_pinned: bool,
    bytes_received: u64,
}

impl<W: AsyncWrite + Unpin + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_size_pinned: false,
            bytes_received: 0,
        }
    }

    /// Fix the read size; a config passed to [`PipeSink::configure`] no
    /// longer overrides it.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_size_pinned = true;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PipeSink for StreamSink<W> {
    fn configure(&mut self, config: &PipeConfig) {
        if !self.chunk_size_pinned {
            self.chunk_size = config.chunk_size.max(1);
        }
    }

    async fn read(&mut self, stream: &mut dyn PipeRead, token: &CancellationToken) -> Result<()> {
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.writer.flush().await?;
                    return Err(PipeError::Cancelled);
                }
                read = stream.read(&mut chunk) => read?,
            };
            if read == 0 {
                break;
            }
            self.writer.write_all(&chunk[..read]).await?;
            self.bytes_received += read as u64;
        }
        self.writer.flush().await?;
        debug!(bytes = self.bytes_received, "stream sink reached end of data");
        Ok(())
    }
}
