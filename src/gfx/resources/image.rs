//! CPU-side bitmaps

use std::ops::{Index, IndexMut};

use bytemuck::{Pod, Zeroable};

use crate::gfx::error::{Error, Result};

/// 8-bit RGBA pixel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct PixelRGBA8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl PixelRGBA8 {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Single-channel depth sample.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PixelDepth(pub f32);

/// Pixel layouts an [`Image`] can hold.
pub trait Pixel: Pod + Default + PartialEq {
    /// Number of channels.
    const COMPONENTS: u32;
}

impl Pixel for PixelRGBA8 {
    const COMPONENTS: u32 = 4;
}

impl Pixel for PixelDepth {
    const COMPONENTS: u32 = 1;
}

/// A `width` x `height` bitmap, stored row by row from the top-left.
///
/// The pixel vector always holds exactly `width * height` pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<P: Pixel> {
    width: u32,
    height: u32,
    pixels: Vec<P>,
}

impl<P: Pixel> Image<P> {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, P::default())
    }

    pub fn filled(width: u32, height: u32, pixel: P) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; width as usize * height as usize],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<P>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(Error::ImageSizeMismatch {
                width,
                height,
                pixels: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn components(&self) -> u32 {
        P::COMPONENTS
    }

    pub fn pixels(&self) -> &[P] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [P] {
        &mut self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&P> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize)
    }

    pub fn put(&mut self, x: u32, y: u32, pixel: P) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.pixels[index] = pixel;
        true
    }

    /// Reverses the row order. Textures are addressed from the bottom row.
    pub fn flip_vertically(&mut self) {
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        let rows = self.height as usize;
        for row in 0..rows / 2 {
            let (top, bottom) = self.pixels.split_at_mut((rows - row - 1) * width);
            top[row * width..(row + 1) * width].swap_with_slice(&mut bottom[..width]);
        }
    }
}

impl Image<PixelRGBA8> {
    /// Wraps tightly packed RGBA bytes.
    pub fn from_rgba_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::ImageSizeMismatch {
                width,
                height,
                pixels: bytes.len() / 4,
            });
        }
        Self::from_pixels(width, height, bytemuck::pod_collect_to_vec(bytes))
    }

    /// Checkerboard of `cell` x `cell` squares, starting with `first` in the
    /// top-left corner.
    pub fn checkerboard(
        width: u32,
        height: u32,
        cell: u32,
        first: PixelRGBA8,
        second: PixelRGBA8,
    ) -> Self {
        let cell = cell.max(1);
        let mut image = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let pixel = if (x / cell + y / cell) % 2 == 0 {
                    first
                } else {
                    second
                };
                image[(x, y)] = pixel;
            }
        }
        image
    }
}

impl<P: Pixel> Index<(u32, u32)> for Image<P> {
    type Output = P;

    fn index(&self, (x, y): (u32, u32)) -> &P {
        match self.get(x, y) {
            Some(pixel) => pixel,
            None => panic!(
                "pixel ({}, {}) is outside a {}x{} image",
                x, y, self.width, self.height
            ),
        }
    }
}

impl<P: Pixel> IndexMut<(u32, u32)> for Image<P> {
    fn index_mut(&mut self, (x, y): (u32, u32)) -> &mut P {
        assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) is outside a {}x{} image",
            x,
            y,
            self.width,
            self.height
        );
        let index = y as usize * self.width as usize + x as usize;
        &mut self.pixels[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(Image::from_pixels(2, 2, vec![PixelRGBA8::BLACK; 4]).is_ok());
        assert!(matches!(
            Image::from_pixels(2, 2, vec![PixelDepth(1.0); 3]),
            Err(Error::ImageSizeMismatch { pixels: 3, .. })
        ));
    }

    #[test]
    fn test_checkerboard_alternates() {
        let image = Image::checkerboard(2, 2, 1, PixelRGBA8::BLACK, PixelRGBA8::WHITE);
        assert_eq!(image[(0, 0)], PixelRGBA8::BLACK);
        assert_eq!(image[(1, 0)], PixelRGBA8::WHITE);
        assert_eq!(image[(0, 1)], PixelRGBA8::WHITE);
        assert_eq!(image[(1, 1)], PixelRGBA8::BLACK);
        assert_eq!(image.as_bytes().len(), 16);
    }

    #[test]
    fn test_flip_vertically() {
        let mut image =
            Image::from_pixels(1, 3, vec![PixelDepth(0.0), PixelDepth(1.0), PixelDepth(2.0)])
                .unwrap();
        image.flip_vertically();
        assert_eq!(
            image.pixels(),
            &[PixelDepth(2.0), PixelDepth(1.0), PixelDepth(0.0)]
        );
    }

    #[test]
    fn test_out_of_range_get() {
        let image: Image<PixelDepth> = Image::new(2, 1);
        assert!(image.get(2, 0).is_none());
        assert!(image.get(1, 0).is_some());
    }
}
