//! Texture resources
//!
//! A [`Texture`] owns one driver texture plus its dimensions, kind and an
//! optional CPU mirror of its pixels. Textures are created from raw
//! dimensions (GPU only), from a decoded image file or from rendered text.

use std::path::Path;

use super::font::Font;
use super::image::{Image, PixelRGBA8};
use crate::gfx::context;
use crate::gfx::driver::{TextureFormat, TextureParameters, TextureTarget};
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::TextureHandle;
use crate::gfx::shader::ShaderProgram;

/// What a texture stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    /// 8-bit RGBA colour.
    #[default]
    Colour,
    /// Half-float RGBA colour.
    HdrColour,
    /// 32-bit float depth.
    Depth,
}

impl TextureKind {
    pub fn components(self) -> u32 {
        match self {
            TextureKind::Colour | TextureKind::HdrColour => 4,
            TextureKind::Depth => 1,
        }
    }

    /// Storage format; gamma correction only applies to 8-bit colour.
    pub fn format(self, gamma_corrected: bool) -> TextureFormat {
        match self {
            TextureKind::Colour if gamma_corrected => TextureFormat::Srgba8,
            TextureKind::Colour => TextureFormat::Rgba8,
            TextureKind::HdrColour => TextureFormat::Rgba16Float,
            TextureKind::Depth => TextureFormat::Depth32Float,
        }
    }

    /// Sampling state a fresh texture of this kind starts with.
    pub fn default_parameters(self) -> TextureParameters {
        match self {
            TextureKind::Colour => TextureParameters::default(),
            TextureKind::HdrColour => TextureParameters::clamped(),
            TextureKind::Depth => TextureParameters::nearest_clamped(),
        }
    }
}

/// A 2D texture.
///
/// `Texture::default()` holds the zero handle; dropping it (or a texture
/// taken with `std::mem::take`) releases nothing.
#[derive(Debug, Default)]
pub struct Texture {
    handle: TextureHandle,
    width: u32,
    height: u32,
    kind: TextureKind,
    gamma_corrected: bool,
    parameters: TextureParameters,
    bitmap: Option<Image<PixelRGBA8>>,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Texture {
    /// Allocates an uninitialised `width` x `height` texture.
    pub fn new(width: u32, height: u32, kind: TextureKind) -> Result<Self> {
        let mut texture = Self::create(kind, false)?;
        texture.upload(width, height, None)?;
        Ok(texture)
    }

    /// Uploads an RGBA bitmap, keeping a copy of it if `store_bitmap`.
    pub fn from_image(image: Image<PixelRGBA8>, store_bitmap: bool) -> Result<Self> {
        Self::from_bitmap(image, false, false, store_bitmap)
    }

    /// Decodes an image file and uploads it as 8-bit colour.
    ///
    /// # Arguments
    /// * `path` - Image file (PNG or JPEG)
    /// * `mipmapping` - Generate mipmaps and sample with trilinear filtering
    /// * `gamma_corrected` - Store as sRGB so sampling returns linear values
    /// * `store_bitmap` - Keep the decoded pixels on the CPU as well
    pub fn from_file(
        path: impl AsRef<Path>,
        mipmapping: bool,
        gamma_corrected: bool,
        store_bitmap: bool,
    ) -> Result<Self> {
        let image = decode_file(path.as_ref())?;
        Self::from_bitmap(image, mipmapping, gamma_corrected, store_bitmap)
    }

    /// Rasterises `text` with `font` and uploads the result.
    pub fn from_text(
        font: &Font,
        text: &str,
        colour: PixelRGBA8,
        store_bitmap: bool,
    ) -> Result<Self> {
        let image = font.render_text(text, colour);
        let mut texture = Self::from_bitmap(image, false, false, store_bitmap)?;
        texture.set_parameters(TextureParameters::clamped())?;
        Ok(texture)
    }

    fn create(kind: TextureKind, gamma_corrected: bool) -> Result<Self> {
        let handle =
            context::with(|ctx| Ok(ctx.driver().create_texture(TextureTarget::Texture2D)?))?;
        log::debug!("Created {:?} texture {}", kind, handle);
        Ok(Self {
            handle,
            width: 0,
            height: 0,
            kind,
            gamma_corrected,
            parameters: kind.default_parameters(),
            bitmap: None,
        })
    }

    fn from_bitmap(
        image: Image<PixelRGBA8>,
        mipmapping: bool,
        gamma_corrected: bool,
        store_bitmap: bool,
    ) -> Result<Self> {
        let mut texture = Self::create(TextureKind::Colour, gamma_corrected)?;
        texture.upload(image.width(), image.height(), Some(image.as_bytes()))?;

        let mut parameters = texture.parameters;
        if mipmapping {
            texture.generate_mipmaps()?;
            parameters = parameters.with_mipmapping();
        }
        texture.set_parameters(parameters)?;

        if store_bitmap {
            texture.bitmap = Some(image);
        }
        Ok(texture)
    }

    fn upload(&mut self, width: u32, height: u32, data: Option<&[u8]>) -> Result<()> {
        let handle = self.handle;
        let format = self.format();
        let parameters = self.parameters;
        context::with(|ctx| {
            ctx.driver()
                .texture_image(handle, None, format, width, height, data)?;
            ctx.driver().texture_parameters(handle, &parameters)?;
            Ok(())
        })?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Replaces the pixels of a colour texture, resizing it to the image.
    /// The stored bitmap, if any, is replaced too.
    pub fn set_data(&mut self, image: &Image<PixelRGBA8>) -> Result<()> {
        if self.kind != TextureKind::Colour {
            log::error!(
                "Cannot upload RGBA pixels to {:?} texture {}",
                self.kind,
                self.handle
            );
            return Err(Error::InvalidFormat(format!(
                "{:?} textures do not take 8-bit RGBA pixels",
                self.kind
            )));
        }
        self.upload(image.width(), image.height(), Some(image.as_bytes()))?;
        if self.bitmap.is_some() {
            self.bitmap = Some(image.clone());
        }
        Ok(())
    }

    pub fn set_parameters(&mut self, parameters: TextureParameters) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().texture_parameters(handle, &parameters)?))?;
        self.parameters = parameters;
        Ok(())
    }

    pub fn generate_mipmaps(&mut self) -> Result<()> {
        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().generate_mipmap(handle)?))
    }

    /// Reads the texture's pixels back from the driver.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        let handle = self.handle;
        context::with(|ctx| Ok(ctx.driver().read_texture(handle, None)?))
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn components(&self) -> u32 {
        self.kind.components()
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn format(&self) -> TextureFormat {
        self.kind.format(self.gamma_corrected)
    }

    pub fn is_gamma_corrected(&self) -> bool {
        self.gamma_corrected
    }

    pub fn parameters(&self) -> TextureParameters {
        self.parameters
    }

    /// CPU copy of the pixels, if the texture was created with one.
    pub fn bitmap(&self) -> Option<&Image<PixelRGBA8>> {
        self.bitmap.as_ref()
    }

    pub fn take_bitmap(&mut self) -> Option<Image<PixelRGBA8>> {
        self.bitmap.take()
    }

    /// Activates texture unit `unit`, binds the texture to it and sets
    /// uniform `sampler` of `program` to `unit`.
    ///
    /// A unit outside the driver's range is rejected and nothing changes.
    pub fn bind(&self, program: &mut ShaderProgram, unit: u32, sampler: &str) -> Result<()> {
        bind_sampler(program, unit, sampler, TextureTarget::Texture2D, self.handle)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let handle = self.handle.take();
        if handle.is_none() {
            return;
        }
        context::release("Texture", |ctx| ctx.release_texture(handle));
        log::debug!("Released texture {}", handle);
    }
}

/// Binds `texture` to `unit` and points `sampler` at it.
pub(crate) fn bind_sampler(
    program: &mut ShaderProgram,
    unit: u32,
    sampler: &str,
    target: TextureTarget,
    texture: TextureHandle,
) -> Result<()> {
    let units = context::limits().ok_or(Error::NoContext)?.max_texture_units;
    if unit >= units {
        log::error!(
            "Texture unit {} is outside the supported range 0..{}; bind of '{}' skipped",
            unit,
            units,
            sampler
        );
        return Err(Error::TextureUnitOutOfRange { unit, count: units });
    }

    program.set_uniform(sampler, unit as i32)?;
    context::with(|ctx| ctx.bind_texture(unit, target, texture))?;
    program.push_uniform(sampler)?;
    Ok(())
}

fn decode_file(path: &Path) -> Result<Image<PixelRGBA8>> {
    let decoded = image::open(path).map_err(|source| {
        log::error!("Failed to decode image {}: {}", path.display(), source);
        Error::ImageDecode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("Decoded {} ({}x{})", path.display(), width, height);
    Image::from_rgba_bytes(width, height, rgba.as_raw())
}
