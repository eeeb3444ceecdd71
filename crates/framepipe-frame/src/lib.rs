//! Raster frame serialization into raw pixel byte streams.
//!
//! A [`RasterFrame`] wraps an image, derives the subprocess pixel-format tag
//! from its channel layout once, and writes its pixel memory verbatim
//! (stride padding included) into any sink:
//! - `gray16le`, `bgr565le`, `bgr24`, `bgra`, `argb`, `rgba`, `rgb48le`
//!
//! The copy buffer is reused across frames and only reallocated when the
//! frame's byte size changes.

pub mod adapter;
pub mod error;
pub mod format;
pub mod raster;

pub use adapter::RasterFrame;
pub use error::{FrameError, Result};
pub use format::{PixelFormat, RasterLayout};
pub use raster::{Bitmap, BitmapLock, PixelLock, Raster};
