use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FrameError, Result};
use crate::format::RasterLayout;

/// Read-only view of locked pixel memory.
///
/// Rows are `stride` bytes apart; the view covers at least `stride * rows`
/// bytes. The lock is released when the view is dropped.
pub trait PixelLock {
    fn stride(&self) -> usize;
    fn rows(&self) -> usize;
    fn as_bytes(&self) -> &[u8];
}

/// An image whose pixel memory can be locked for reading.
pub trait Raster {
    type Pixels<'a>: PixelLock
    where
        Self: 'a;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layout(&self) -> RasterLayout;

    /// Lock the pixel memory for read-only access.
    fn lock_pixels(&self) -> Result<Self::Pixels<'_>>;
}

/// Heap-backed raster with GDI-style row padding.
#[derive(Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    layout: RasterLayout,
    stride: usize,
    data: Vec<u8>,
    locked: AtomicBool,
}

impl Bitmap {
    /// Zeroed bitmap with rows padded to 4 bytes.
    ///
    /// # Panics
    ///
    /// Panics if `stride * height` overflows `usize`. Use
    /// [`from_pixels`](Self::from_pixels) for untrusted dimensions.
    pub fn new(width: u32, height: u32, layout: RasterLayout) -> Self {
        let stride = layout.aligned_stride(width);
        Self {
            width,
            height,
            layout,
            stride,
            data: vec![0; stride * height as usize],
            locked: AtomicBool::new(false),
        }
    }

    /// Wrap existing pixel memory.
    ///
    /// `stride` must hold one unpadded row and `data` must hold `height` rows.
    pub fn from_pixels(
        width: u32,
        height: u32,
        layout: RasterLayout,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row_bytes = layout.row_bytes(width);
        if stride < row_bytes {
            return Err(FrameError::InvalidGeometry(format!(
                "stride {stride} is shorter than a {width}px {layout} row ({row_bytes} bytes)"
            )));
        }
        let needed = frame_span(stride, height as usize)?;
        if data.len() < needed {
            return Err(FrameError::InvalidGeometry(format!(
                "{} bytes of pixel data, {height} rows of stride {stride} need {needed}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            layout,
            stride,
            data,
            locked: AtomicBool::new(false),
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One row of pixel memory, padding included.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not below the bitmap height.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of range for height {}", self.height);
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Byte span of `rows` rows of `stride` bytes.
pub(crate) fn frame_span(stride: usize, rows: usize) -> Result<usize> {
    stride.checked_mul(rows).ok_or_else(|| {
        FrameError::InvalidGeometry(format!("{rows} rows of stride {stride} overflow usize"))
    })
}

impl Raster for Bitmap {
    type Pixels<'a> = BitmapLock<'a>;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layout(&self) -> RasterLayout {
        self.layout
    }

    fn lock_pixels(&self) -> Result<BitmapLock<'_>> {
        if self.locked.swap(true, Ordering::AcqRel) {
            return Err(FrameError::AlreadyLocked);
        }
        Ok(BitmapLock { bitmap: self })
    }
}

/// Read lock on a [`Bitmap`]; unlocks on drop.
#[derive(Debug)]
pub struct BitmapLock<'a> {
    bitmap: &'a Bitmap,
}

impl PixelLock for BitmapLock<'_> {
    fn stride(&self) -> usize {
        self.bitmap.stride
    }

    fn rows(&self) -> usize {
        self.bitmap.height as usize
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bitmap.data
    }
}

impl Drop for BitmapLock<'_> {
    fn drop(&mut self) {
        self.bitmap.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_padded_and_zeroed() {
        let bitmap = Bitmap::new(3, 2, RasterLayout::Rgb24);
        assert_eq!(bitmap.stride(), 12);
        assert_eq!(bitmap.pixels().len(), 24);
        assert!(bitmap.pixels().iter().all(|b| *b == 0));
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let bitmap = Bitmap::new(2, 2, RasterLayout::Argb32);
        {
            let lock = bitmap.lock_pixels().unwrap();
            assert!(bitmap.is_locked());
            assert_eq!(lock.stride(), 8);
            assert_eq!(lock.rows(), 2);
            assert!(matches!(bitmap.lock_pixels(), Err(FrameError::AlreadyLocked)));
        }
        assert!(!bitmap.is_locked());
        assert!(bitmap.lock_pixels().is_ok());
    }

    #[test]
    fn from_pixels_validates_geometry() {
        let short_stride = Bitmap::from_pixels(4, 1, RasterLayout::Rgb24, 8, vec![0; 8]);
        assert!(matches!(short_stride, Err(FrameError::InvalidGeometry(_))));

        let short_data = Bitmap::from_pixels(4, 2, RasterLayout::Rgb24, 12, vec![0; 20]);
        assert!(matches!(short_data, Err(FrameError::InvalidGeometry(_))));

        let ok = Bitmap::from_pixels(4, 2, RasterLayout::Rgb24, 16, vec![7; 32]).unwrap();
        assert_eq!(ok.stride(), 16);
    }

    #[test]
    fn from_pixels_reports_overflowing_geometry() {
        let huge = Bitmap::from_pixels(4, u32::MAX, RasterLayout::Rgb24, usize::MAX / 2, vec![0; 16]);
        assert!(matches!(huge, Err(FrameError::InvalidGeometry(_))));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn row_mut_rejects_rows_past_the_end() {
        let mut bitmap = Bitmap::new(1, 2, RasterLayout::Argb32);
        bitmap.row_mut(2);
    }

    #[test]
    fn row_mut_addresses_one_row() {
        let mut bitmap = Bitmap::new(1, 3, RasterLayout::Argb32);
        bitmap.row_mut(1).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(bitmap.pixels(), &[0, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 0]);
    }
}
