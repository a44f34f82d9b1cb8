use crate::error::{Error, Result};

/// Borrowed RGBA8 pixel buffer, row-major, rows stored top-to-bottom.
///
/// This is the layout the `image` crate decodes into. Texture lookups
/// (`sample_nearest`) use normalized coordinates with the origin in the
/// bottom-left corner, matching how quilt views are numbered.
#[derive(Clone, Copy, Debug)]
pub struct QuiltImageView<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl<'a> QuiltImageView<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Rec. 601 luma of the pixel at `(x, y)`.
    #[inline]
    pub fn luminance(&self, x: u32, y: u32) -> f64 {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        0.299 * f64::from(self.data[idx])
            + 0.587 * f64::from(self.data[idx + 1])
            + 0.114 * f64::from(self.data[idx + 2])
    }

    /// Nearest-texel lookup with clamp-to-edge addressing. `v = 0` is the
    /// bottom row of the image.
    pub fn sample_nearest(&self, u: f32, v: f32) -> [u8; 4] {
        let w = self.width as f32;
        let h = self.height as f32;
        let x = (u * w).floor().clamp(0.0, w - 1.0) as u32;
        let row_from_bottom = (v * h).floor().clamp(0.0, h - 1.0) as u32;
        self.pixel(x, self.height - 1 - row_from_bottom)
    }
}
