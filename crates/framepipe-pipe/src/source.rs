use std::fmt;

use async_trait::async_trait;
use framepipe_frame::{PixelFormat, Raster, RasterFrame};
use framepipe_transport::{PipeConfig, PipeRead, PipeWrite, DEFAULT_CHUNK_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PipeError, Result};

/// Frame rate advertised for raw video when none is set.
pub const DEFAULT_FRAME_RATE: f64 = 25.0;

/// Producer side of an outbound pipe.
#[async_trait]
pub trait PipeSource: Send {
    /// Subprocess arguments describing the stream, placed before `-i`.
    fn stream_arguments(&self) -> String;

    /// Adopt the owning argument's config before the transfer starts.
    fn configure(&mut self, _config: &PipeConfig) {}

    /// Write everything this source has into `stream`.
    ///
    /// Returns [`PipeError::Cancelled`] when `token` fires between units.
    async fn write(&mut self, stream: &mut dyn PipeWrite, token: &CancellationToken)
        -> Result<()>;
}

/// Geometry and format shared by every frame of a raw video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameShape {
    pub fn of<R: Raster>(frame: &RasterFrame<R>) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            format: frame.format(),
        }
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

type FrameIter<R> = Box<dyn Iterator<Item = RasterFrame<R>> + Send>;

/// Raw video frames, written back to back with no container.
///
/// The stream shape is taken from the first frame; every later frame must
/// match it.
pub struct RawVideoSource<R> {
    first: Option<RasterFrame<R>>,
    rest: FrameIter<R>,
    shape: FrameShape,
    frame_rate: f64,
    frames_written: u64,
}

impl<R: Raster + Send + 'static> RawVideoSource<R> {
    pub fn new<I>(frames: I) -> Result<Self>
    where
        I: IntoIterator<Item = RasterFrame<R>>,
        I::IntoIter: Send + 'static,
    {
        let mut rest = frames.into_iter();
        let first = rest.next().ok_or(PipeError::EmptySource)?;
        Ok(Self {
            shape: FrameShape::of(&first),
            first: Some(first),
            rest: Box::new(rest),
            frame_rate: DEFAULT_FRAME_RATE,
            frames_written: 0,
        })
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn next_frame(&mut self) -> Option<RasterFrame<R>> {
        self.first.take().or_else(|| self.rest.next())
    }
}

#[async_trait]
impl<R: Raster + Send + 'static> PipeSource for RawVideoSource<R> {
    fn stream_arguments(&self) -> String {
        format!(
            "-f rawvideo -r {} -pix_fmt {} -s {}x{}",
            self.frame_rate, self.shape.format, self.shape.width, self.shape.height
        )
    }

    async fn write(
        &mut self,
        stream: &mut dyn PipeWrite,
        token: &CancellationToken,
    ) -> Result<()> {
        while let Some(mut frame) = self.next_frame() {
            if token.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            let shape = FrameShape::of(&frame);
            if shape != self.shape {
                return Err(PipeError::FrameMismatch {
                    expected: self.shape,
                    actual: shape,
                });
            }
            frame.write_frame_async(stream, token).await?;
            self.frames_written += 1;
        }
        stream.flush().await?;
        debug!(frames = self.frames_written, "raw video source exhausted");
        Ok(())
    }
}

/// Copies an arbitrary byte stream (an encoded file, say) into the pipe.
pub struct StreamSource<S> {
    reader: S,
    stream_arguments: String,
    chunk_size: usize,
    chunk_size_pinned: bool,
}

impl<S: PipeRead> StreamSource<S> {
    pub fn new(reader: S) -> Self {
        Self {
            reader,
            stream_arguments: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_size_pinned: false,
        }
    }

    /// Input format hint for the subprocess, e.g. `-f mp4`.
    pub fn with_stream_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.stream_arguments = arguments.into();
        self
    }

    /// Fix the copy size; a config passed to [`PipeSource::configure`] no
    /// longer overrides it.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_size_pinned = true;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[async_trait]
impl<S: PipeRead> PipeSource for StreamSource<S> {
    fn stream_arguments(&self) -> String {
        self.stream_arguments.clone()
    }

    fn configure(&mut self, config: &PipeConfig) {
        if !self.chunk_size_pinned {
            self.chunk_size = config.chunk_size.max(1);
        }
    }

    async fn write(
        &mut self,
        stream: &mut dyn PipeWrite,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut chunk = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PipeError::Cancelled),
                read = self.reader.read(&mut chunk) => read?,
            };
            if read == 0 {
                break;
            }
            stream.write_all(&chunk[..read]).await?;
            total += read as u64;
        }
        stream.flush().await?;
        debug!(bytes = total, "stream source exhausted");
        Ok(())
    }
}
