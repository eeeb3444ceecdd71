use crate::format::{PixelFormat, RasterLayout};

/// Errors that can occur while serializing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The raster's channel layout has no pixel-format tag.
    #[error("unsupported pixel layout {0}")]
    UnsupportedLayout(RasterLayout),

    /// A replacement raster maps to a different tag than the adapter's.
    #[error("pixel format changed from {expected} to {actual}")]
    FormatChanged {
        expected: PixelFormat,
        actual: PixelFormat,
    },

    /// The pixel memory is already locked by another reader.
    #[error("raster pixels are already locked")]
    AlreadyLocked,

    /// Stride, height and backing memory do not describe a valid image.
    #[error("invalid raster geometry: {0}")]
    InvalidGeometry(String),

    /// An I/O error occurred while writing to the sink.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
