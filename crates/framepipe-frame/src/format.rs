//! Raster channel layouts and the pixel-format tags they map to.

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// In-memory channel layout of a raster image.
///
/// Multi-byte channels are little-endian; color channels are stored in
/// B, G, R(, A) byte order, as GDI-style bitmaps do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterLayout {
    Indexed1,
    Indexed4,
    Indexed8,
    Gray16,
    Rgb555,
    Rgb565,
    Argb1555,
    Rgb24,
    Rgb32,
    Argb32,
    PArgb32,
    Rgb48,
    Argb64,
    PArgb64,
}

impl RasterLayout {
    /// Every known layout, supported or not.
    pub const ALL: [RasterLayout; 14] = [
        RasterLayout::Indexed1,
        RasterLayout::Indexed4,
        RasterLayout::Indexed8,
        RasterLayout::Gray16,
        RasterLayout::Rgb555,
        RasterLayout::Rgb565,
        RasterLayout::Argb1555,
        RasterLayout::Rgb24,
        RasterLayout::Rgb32,
        RasterLayout::Argb32,
        RasterLayout::PArgb32,
        RasterLayout::Rgb48,
        RasterLayout::Argb64,
        RasterLayout::PArgb64,
    ];

    pub fn bits_per_pixel(self) -> usize {
        match self {
            RasterLayout::Indexed1 => 1,
            RasterLayout::Indexed4 => 4,
            RasterLayout::Indexed8 => 8,
            RasterLayout::Gray16
            | RasterLayout::Rgb555
            | RasterLayout::Rgb565
            | RasterLayout::Argb1555 => 16,
            RasterLayout::Rgb24 => 24,
            RasterLayout::Rgb32 | RasterLayout::Argb32 | RasterLayout::PArgb32 => 32,
            RasterLayout::Rgb48 => 48,
            RasterLayout::Argb64 | RasterLayout::PArgb64 => 64,
        }
    }

    /// Bytes needed for one row of `width` pixels, without padding.
    pub fn row_bytes(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel()).div_ceil(8)
    }

    /// Row stride padded to a 4-byte boundary.
    pub fn aligned_stride(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel()).div_ceil(32) * 4
    }

    pub fn name(self) -> &'static str {
        match self {
            RasterLayout::Indexed1 => "indexed1",
            RasterLayout::Indexed4 => "indexed4",
            RasterLayout::Indexed8 => "indexed8",
            RasterLayout::Gray16 => "gray16",
            RasterLayout::Rgb555 => "rgb555",
            RasterLayout::Rgb565 => "rgb565",
            RasterLayout::Argb1555 => "argb1555",
            RasterLayout::Rgb24 => "rgb24",
            RasterLayout::Rgb32 => "rgb32",
            RasterLayout::Argb32 => "argb32",
            RasterLayout::PArgb32 => "pargb32",
            RasterLayout::Rgb48 => "rgb48",
            RasterLayout::Argb64 => "argb64",
            RasterLayout::PArgb64 => "pargb64",
        }
    }
}

impl fmt::Display for RasterLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RasterLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RasterLayout::ALL
            .into_iter()
            .find(|layout| layout.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown raster layout: {s}"))
    }
}

/// Pixel-format tag understood by the subprocess (`-pix_fmt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray16Le,
    Bgr565Le,
    Bgr24,
    Bgra,
    Argb,
    Rgba,
    Rgb48Le,
}

impl PixelFormat {
    /// The supported layouts and their tags.
    pub const SUPPORTED: [(RasterLayout, PixelFormat); 7] = [
        (RasterLayout::Gray16, PixelFormat::Gray16Le),
        (RasterLayout::Rgb565, PixelFormat::Bgr565Le),
        (RasterLayout::Rgb24, PixelFormat::Bgr24),
        (RasterLayout::Argb32, PixelFormat::Bgra),
        (RasterLayout::PArgb32, PixelFormat::Argb),
        (RasterLayout::Rgb32, PixelFormat::Rgba),
        (RasterLayout::Rgb48, PixelFormat::Rgb48Le),
    ];

    /// Map a raster layout to its tag.
    ///
    /// Layouts outside [`SUPPORTED`](Self::SUPPORTED) are an error; there is
    /// no fallback format.
    pub fn from_layout(layout: RasterLayout) -> Result<Self> {
        match layout {
            RasterLayout::Gray16 => Ok(PixelFormat::Gray16Le),
            RasterLayout::Rgb565 => Ok(PixelFormat::Bgr565Le),
            RasterLayout::Rgb24 => Ok(PixelFormat::Bgr24),
            RasterLayout::Argb32 => Ok(PixelFormat::Bgra),
            // Premultiplied alpha has no exact counterpart; argb is the closest.
            RasterLayout::PArgb32 => Ok(PixelFormat::Argb),
            RasterLayout::Rgb32 => Ok(PixelFormat::Rgba),
            RasterLayout::Rgb48 => Ok(PixelFormat::Rgb48Le),
            other => Err(FrameError::UnsupportedLayout(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Gray16Le => "gray16le",
            PixelFormat::Bgr565Le => "bgr565le",
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Argb => "argb",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Rgb48Le => "rgb48le",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PixelFormat::SUPPORTED
            .into_iter()
            .map(|(_, format)| format)
            .find(|format| format.as_str() == s)
            .ok_or_else(|| format!("unknown pixel format: {s}"))
    }
}
