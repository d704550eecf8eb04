//! Film accumulation and image output.

use crate::core::common::*;
use crate::core::geometry::Vector3f;

/// A rectangular region of pixels rendered by one worker.
pub struct FilmTile {
    /// First pixel column covered by the tile.
    pub x0: usize,

    /// First pixel row covered by the tile.
    pub y0: usize,

    /// Tile width in pixels.
    pub width: usize,

    /// Tile height in pixels.
    pub height: usize,

    /// Mean radiance per pixel, in row-major order.
    pub pixels: Vec<Vector3f>,
}

/// Accumulates radiance per pixel and writes the final image.
pub struct Film {
    /// Image width in pixels.
    pub width: usize,

    /// Image height in pixels.
    pub height: usize,

    pixels: Vec<Vector3f>,
}

impl Film {
    /// Create a new black film.
    ///
    /// * `width`  - Image width in pixels.
    /// * `height` - Image height in pixels.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vector3f::ZERO; width * height],
        }
    }

    /// Merge a rendered tile into the film.
    ///
    /// * `tile` - The tile.
    pub fn merge_tile(&mut self, tile: &FilmTile) {
        for row in 0..tile.height {
            for col in 0..tile.width {
                let x = tile.x0 + col;
                let y = tile.y0 + row;
                self.pixels[y * self.width + x] = tile.pixels[row * tile.width + col];
            }
        }
    }

    /// Returns the radiance stored for a pixel.
    ///
    /// * `x` - Pixel column.
    /// * `y` - Pixel row.
    pub fn pixel(&self, x: usize, y: usize) -> Vector3f {
        self.pixels[y * self.width + x]
    }

    /// Write the film as an 8-bit gamma-corrected PNG.
    ///
    /// * `path`     - Output file path.
    /// * `exposure` - Linear scale applied before gamma correction.
    pub fn write_png(&self, path: &str, exposure: Float) -> Result<(), String> {
        let mut img = image::RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let v = self.pixels[y as usize * self.width + x as usize] * exposure;
            *pixel = image::Rgb([to_srgb8(v.x), to_srgb8(v.y), to_srgb8(v.z)]);
        }
        img.save(path)
            .map_err(|e| format!("Failed to write image '{path}': {e}"))
    }
}

fn to_srgb8(value: Float) -> u8 {
    (gamma_correct(clamp(value, 0.0, 1.0)) * 255.0 + 0.5) as u8
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
