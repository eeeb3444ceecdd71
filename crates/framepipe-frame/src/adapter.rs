use std::io::{self, Write};

use bytes::BytesMut;
use framepipe_transport::Transience;
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::format::{PixelFormat, RasterLayout};
use crate::raster::{frame_span, PixelLock, Raster};

#[cfg(feature = "async")]
use tokio::io::{AsyncWrite, AsyncWriteExt};
#[cfg(feature = "async")]
use tokio_util::sync::CancellationToken;

/// Serializes one raster's pixel memory into byte sinks.
///
/// The pixel-format tag is fixed at construction. Each write copies
/// `stride * height` bytes into a reusable buffer, reallocating only when
/// that length changed since the previous write, then writes the buffer to
/// the sink in one piece.
///
/// The adapter owns the raster: dropping it releases both the buffer and
/// the image. Use [`into_raster`](Self::into_raster) to take the image back.
pub struct RasterFrame<R> {
    raster: R,
    format: PixelFormat,
    buffer: BytesMut,
    reallocations: u64,
}

impl<R: Raster> RasterFrame<R> {
    /// Wrap a raster, failing on layouts without a pixel-format tag.
    pub fn new(raster: R) -> Result<Self> {
        let format = PixelFormat::from_layout(raster.layout())?;
        Ok(Self {
            raster,
            format,
            buffer: BytesMut::new(),
            reallocations: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn raster(&self) -> &R {
        &self.raster
    }

    /// Swap in another raster, returning the previous one.
    ///
    /// The replacement may differ in size but must map to the same pixel
    /// format; otherwise the adapter is left untouched.
    pub fn set_raster(&mut self, raster: R) -> Result<R> {
        self.check_format(raster.layout())?;
        Ok(std::mem::replace(&mut self.raster, raster))
    }

    fn check_format(&self, layout: RasterLayout) -> Result<()> {
        let actual = PixelFormat::from_layout(layout)?;
        if actual != self.format {
            return Err(FrameError::FormatChanged {
                expected: self.format,
                actual,
            });
        }
        Ok(())
    }

    pub fn into_raster(self) -> R {
        self.raster
    }

    /// Bytes copied per frame at the last write (0 before the first).
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// How many times the copy buffer has been (re)allocated.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Write the frame into a blocking sink.
    ///
    /// Write failures are dropped when the sink is transient and returned
    /// otherwise.
    pub fn write_frame<W>(&mut self, sink: &mut W) -> Result<()>
    where
        W: Write + Transience + ?Sized,
    {
        self.load()?;
        let written = sink.write_all(&self.buffer);
        settle_write(written, sink.is_transient())
    }

    /// Write the frame into an async sink.
    ///
    /// When `token` is already cancelled the write is skipped entirely, so
    /// the sink never sees a partial frame from this call.
    #[cfg(feature = "async")]
    pub async fn write_frame_async<W>(
        &mut self,
        sink: &mut W,
        token: &CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Transience + Unpin + ?Sized,
    {
        self.load()?;
        if token.is_cancelled() {
            debug!("cancellation requested, skipping frame write");
            return Ok(());
        }
        let written = sink.write_all(&self.buffer).await;
        settle_write(written, sink.is_transient())
    }

    /// Copy the locked pixel memory into the reusable buffer.
    ///
    /// The lock is held only for the copy and is released on every path.
    fn load(&mut self) -> Result<()> {
        self.check_format(self.raster.layout())?;
        let pixels = self.raster.lock_pixels()?;
        let span = frame_span(pixels.stride(), pixels.rows())?;
        let source = pixels.as_bytes().get(..span).ok_or_else(|| {
            FrameError::InvalidGeometry(format!(
                "locked pixel memory holds {} bytes, frame needs {span}",
                pixels.as_bytes().len()
            ))
        })?;

        if self.buffer.len() != span {
            self.buffer = BytesMut::zeroed(span);
            self.reallocations += 1;
        }
        self.buffer.copy_from_slice(source);
        Ok(())
    }
}

fn settle_write(written: io::Result<()>, transient: bool) -> Result<()> {
    match written {
        Ok(()) => Ok(()),
        Err(err) if transient => {
            debug!(error = %err, "peer went away mid-frame, dropping write");
            Ok(())
        }
        Err(err) => Err(FrameError::Io(err)),
    }
}

impl<R: Raster> std::fmt::Debug for RasterFrame<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterFrame")
            .field("width", &self.raster.width())
            .field("height", &self.raster.height())
            .field("format", &self.format)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}
