//! Render targets
//!
//! A [`Frame`] is anything a [`Device`](super::Device) can draw into: the
//! window's default target or an offscreen [`FrameBuffer`].

use crate::gfx::context;
use crate::gfx::driver::{Attachment, ClearMask};
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::FramebufferHandle;
use crate::gfx::resources::{Texture, TextureKind};

/// A render target.
pub trait Frame {
    /// Driver handle of the target; the window uses the zero handle.
    fn handle(&self) -> FramebufferHandle;

    fn dimensions(&self) -> (u32, u32);

    /// Colour the target is cleared to.
    fn clear_colour(&self) -> [f32; 4];

    /// Makes this the current render target.
    fn bind(&self) -> Result<()> {
        let handle = self.handle();
        context::with(|ctx| ctx.bind_framebuffer(handle))
    }

    /// Binds the target and clears its colour, depth and stencil planes.
    fn clear(&self) -> Result<()> {
        self.bind()?;
        let colour = self.clear_colour();
        context::with(|ctx| {
            ctx.driver().clear_colour(colour);
            Ok(ctx.driver().clear(ClearMask::ALL)?)
        })
    }

    fn is_bound(&self) -> bool {
        context::bound::framebuffer() == self.handle()
    }
}

/// The window's default render target.
///
/// The windowing layer owns the surface; this only records its size so
/// viewports and projections can be derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFrame {
    width: u32,
    height: u32,
    clear_colour: [f32; 4],
}

impl WindowFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Sets the clear colour (builder pattern)
    pub fn with_clear_colour(mut self, colour: [f32; 4]) -> Self {
        self.clear_colour = colour;
        self
    }

    /// Tracks a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl Frame for WindowFrame {
    fn handle(&self) -> FramebufferHandle {
        FramebufferHandle::NONE
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear_colour(&self) -> [f32; 4] {
        self.clear_colour
    }
}

/// Offscreen render target with texture attachments.
#[derive(Debug)]
pub struct FrameBuffer {
    handle: FramebufferHandle,
    width: u32,
    height: u32,
    clear_colour: [f32; 4],
    attachments: Vec<(Attachment, Texture)>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let handle = context::with(|ctx| Ok(ctx.driver().create_framebuffer()?))?;
        log::debug!("Created framebuffer {} ({}x{})", handle, width, height);
        Ok(Self {
            handle,
            width,
            height,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            attachments: Vec::new(),
        })
    }

    /// Sets the clear colour (builder pattern)
    pub fn with_clear_colour(mut self, colour: [f32; 4]) -> Self {
        self.clear_colour = colour;
        self
    }

    /// Attaches an existing texture, replacing whatever used that point.
    /// The texture must match the framebuffer's dimensions.
    pub fn attach(&mut self, attachment: Attachment, texture: Texture) -> Result<()> {
        if (texture.width(), texture.height()) != (self.width, self.height) {
            log::error!(
                "Cannot attach a {}x{} texture to {}x{} framebuffer {}",
                texture.width(),
                texture.height(),
                self.width,
                self.height,
                self.handle
            );
            return Err(Error::ImageSizeMismatch {
                width: self.width,
                height: self.height,
                pixels: texture.width() as usize * texture.height() as usize,
            });
        }
        let handle = self.handle;
        let texture_handle = texture.handle();
        context::with(|ctx| {
            Ok(ctx
                .driver()
                .framebuffer_texture(handle, attachment, texture_handle)?)
        })?;
        self.attachments.retain(|(existing, _)| *existing != attachment);
        self.attachments.push((attachment, texture));
        Ok(())
    }

    /// Creates and attaches a colour texture at colour attachment `index`.
    pub fn add_colour_attachment(&mut self, index: u32, kind: TextureKind) -> Result<()> {
        let texture = Texture::new(self.width, self.height, kind)?;
        self.attach(Attachment::Colour(index), texture)
    }

    /// Creates and attaches a depth texture.
    pub fn add_depth_attachment(&mut self) -> Result<()> {
        let texture = Texture::new(self.width, self.height, TextureKind::Depth)?;
        self.attach(Attachment::Depth, texture)
    }

    pub fn attachment(&self, attachment: Attachment) -> Option<&Texture> {
        self.attachments
            .iter()
            .find(|(existing, _)| *existing == attachment)
            .map(|(_, texture)| texture)
    }

    pub fn colour_texture(&self, index: u32) -> Option<&Texture> {
        self.attachment(Attachment::Colour(index))
    }

    pub fn depth_texture(&self) -> Option<&Texture> {
        self.attachment(Attachment::Depth)
    }

    pub fn has_depth(&self) -> bool {
        self.depth_texture().is_some()
    }
}

impl Frame for FrameBuffer {
    fn handle(&self) -> FramebufferHandle {
        self.handle
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear_colour(&self) -> [f32; 4] {
        self.clear_colour
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        let handle = self.handle.take();
        if handle.is_none() {
            return;
        }
        context::release("FrameBuffer", |ctx| ctx.release_framebuffer(handle));
        log::debug!("Released framebuffer {}", handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::test_support::headless;

    #[test]
    fn test_framebuffer_clear_fills_attachments() {
        let (_gfx, recorder) = headless();
        let mut target = FrameBuffer::new(2, 2)
            .unwrap()
            .with_clear_colour([1.0, 0.0, 0.0, 1.0]);
        target.add_colour_attachment(0, TextureKind::Colour).unwrap();
        target.add_depth_attachment().unwrap();

        target.clear().unwrap();
        assert!(target.is_bound());
        let colour = target.colour_texture(0).unwrap().read_pixels().unwrap();
        assert_eq!(&colour[..4], &[255, 0, 0, 255]);
        let depth = target.depth_texture().unwrap().read_pixels().unwrap();
        assert_eq!(&depth[..4], &1.0f32.to_ne_bytes());

        let clears = recorder.clears();
        assert_eq!(clears.len(), 1);
        assert_eq!(clears[0].framebuffer, target.handle());
        assert_eq!(clears[0].mask, ClearMask::ALL);
    }

    #[test]
    fn test_attachment_must_match_size() {
        let (_gfx, _) = headless();
        let mut target = FrameBuffer::new(4, 4).unwrap();
        let small = Texture::new(2, 2, TextureKind::Colour).unwrap();
        assert!(target.attach(Attachment::Colour(0), small).is_err());
        assert!(target.colour_texture(0).is_none());
    }

    #[test]
    fn test_window_frame_binds_default_target() {
        let (_gfx, recorder) = headless();
        let target = FrameBuffer::new(1, 1).unwrap();
        target.bind().unwrap();

        let mut window = WindowFrame::new(640, 480);
        window.clear().unwrap();
        assert!(window.is_bound());
        assert!(!target.is_bound());
        window.resize(800, 600);
        assert_eq!(window.dimensions(), (800, 600));
        assert!(recorder.clears()[0].framebuffer.is_none());
    }
}
