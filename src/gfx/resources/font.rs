//! Font loading and text rasterisation
//!
//! Text is laid out and rasterised on the CPU with `fontdue`, then composed
//! into a single RGBA bitmap that a [`Texture`](super::Texture) can upload.

use std::path::Path;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use super::image::{Image, PixelRGBA8};
use crate::gfx::error::{Error, Result};

/// A parsed font at a fixed pixel size.
pub struct Font {
    inner: fontdue::Font,
    size: f32,
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.inner.name())
            .field("size", &self.size)
            .finish()
    }
}

/// One rasterised glyph placed in text space (y down, origin top-left).
#[derive(Debug, Clone)]
struct PlacedGlyph {
    x: i32,
    y: i32,
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

impl Font {
    /// Parses a TrueType or OpenType font from raw bytes.
    pub fn from_bytes(bytes: &[u8], size: f32) -> Result<Self> {
        let inner = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|error| {
                log::error!("Failed to parse font: {}", error);
                Error::FontLoad(error.to_string())
            })?;
        Ok(Self {
            inner,
            size: size.max(1.0),
        })
    }

    pub fn from_file(path: impl AsRef<Path>, size: f32) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|error| {
            log::error!("Failed to read font {}: {}", path.display(), error);
            Error::FontLoad(format!("{}: {}", path.display(), error))
        })?;
        Self::from_bytes(&bytes, size)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Rasterises `text` in `colour` onto a transparent bitmap just large
    /// enough to hold it. Empty text yields a 1x1 transparent bitmap.
    pub fn render_text(&self, text: &str, colour: PixelRGBA8) -> Image<PixelRGBA8> {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.inner], &TextStyle::new(text, self.size, 0));

        let glyphs: Vec<PlacedGlyph> = layout
            .glyphs()
            .iter()
            .filter(|glyph| glyph.char_data.rasterize() && glyph.width > 0 && glyph.height > 0)
            .map(|glyph| {
                let (metrics, coverage) = self.inner.rasterize_config(glyph.key);
                PlacedGlyph {
                    x: glyph.x.floor() as i32,
                    y: glyph.y.floor() as i32,
                    width: metrics.width,
                    height: metrics.height,
                    coverage,
                }
            })
            .collect();

        compose(&glyphs, layout.height().ceil() as u32, colour)
    }
}

/// Blends glyph coverage into one bitmap sized to the glyph bounds.
fn compose(glyphs: &[PlacedGlyph], line_height: u32, colour: PixelRGBA8) -> Image<PixelRGBA8> {
    let right = glyphs
        .iter()
        .map(|glyph| glyph.x.max(0) as u32 + glyph.width as u32)
        .max()
        .unwrap_or(0);
    let bottom = glyphs
        .iter()
        .map(|glyph| glyph.y.max(0) as u32 + glyph.height as u32)
        .max()
        .unwrap_or(0)
        .max(line_height);

    if right == 0 || bottom == 0 {
        return Image::filled(1, 1, PixelRGBA8::TRANSPARENT);
    }

    let mut image = Image::filled(right, bottom, PixelRGBA8::TRANSPARENT);
    for glyph in glyphs {
        for row in 0..glyph.height {
            for column in 0..glyph.width {
                let coverage = glyph.coverage[row * glyph.width + column];
                if coverage == 0 {
                    continue;
                }
                let x = glyph.x.max(0) as u32 + column as u32;
                let y = glyph.y.max(0) as u32 + row as u32;
                let alpha = (coverage as u32 * colour.a as u32 / 255) as u8;
                if let Some(existing) = image.get(x, y) {
                    if existing.a >= alpha {
                        continue;
                    }
                }
                image.put(x, y, PixelRGBA8::new(colour.r, colour.g, colour.b, alpha));
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        assert!(matches!(
            Font::from_bytes(b"not a font", 16.0),
            Err(Error::FontLoad(_))
        ));
        assert!(matches!(
            Font::from_file("/definitely/not/here.ttf", 16.0),
            Err(Error::FontLoad(_))
        ));
    }

    #[test]
    fn test_compose_places_coverage() {
        let glyphs = [
            PlacedGlyph {
                x: 0,
                y: 1,
                width: 2,
                height: 1,
                coverage: vec![255, 0],
            },
            PlacedGlyph {
                x: 3,
                y: 0,
                width: 1,
                height: 2,
                coverage: vec![128, 255],
            },
        ];
        let image = compose(&glyphs, 2, PixelRGBA8::WHITE);
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image[(0, 1)], PixelRGBA8::WHITE);
        assert_eq!(image[(1, 1)], PixelRGBA8::TRANSPARENT);
        assert_eq!(image[(3, 0)].a, 128);
    }

    #[test]
    fn test_empty_text_is_one_transparent_pixel() {
        let image = compose(&[], 0, PixelRGBA8::WHITE);
        assert_eq!(image.dimensions(), (1, 1));
        assert_eq!(image[(0, 0)], PixelRGBA8::TRANSPARENT);
    }

    #[test]
    fn test_render_text_with_system_font() {
        let path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
        if !Path::new(path).exists() {
            return;
        }
        let font = Font::from_file(path, 24.0).unwrap();
        let image = font.render_text("Hi", PixelRGBA8::WHITE);
        assert!(image.width() > 1);
        assert!(image.pixels().iter().any(|pixel| pixel.a > 0));
    }
}
