//! # Topaz Prelude
//!
//! Commonly used types in one import.
//!
//! ```no_run
//! use topaz::prelude::*;
//!
//! fn main() -> topaz::Result<()> {
//!     init_logging(LoggingConfig::default());
//!     let _gfx = topaz::headless()?;
//!
//!     let mut program = pass_through("position", "texcoord", "albedo")?;
//!     let texture = Texture::from_image(
//!         Image::checkerboard(8, 8, 2, PixelRGBA8::BLACK, PixelRGBA8::WHITE),
//!         false,
//!     )?;
//!     texture.bind(&mut program, 0, "albedo")?;
//!     Ok(())
//! }
//! ```

// Re-export context and configuration
pub use crate::gfx::{bound, initialise, ContextConfig, GraphicsContext, Limits};
pub use crate::logging::{init_logging, LoggingConfig};

// Re-export resources
pub use crate::gfx::resources::{
    fmt, kind, Buffer, CubeMap, DisplacementMap, Font, Format, Image, IndexBuffer, MappedView,
    NormalMap, Object, ParallaxMap, PixelDepth, PixelRGBA8, Texture, TextureKind, UniformBuffer,
    VertexBuffer,
};

// Re-export shaders and rendering
pub use crate::gfx::driver::{DrawMode, ShaderType};
pub use crate::gfx::rendering::{Device, Frame, FrameBuffer, WindowFrame};
pub use crate::gfx::shader::{pass_through, ShaderProgram, Uniform};

// Re-export errors
pub use crate::gfx::error::{Error, Result};

// Re-export common math types used by uniforms
pub use cgmath::{Matrix4, Vector2, Vector3, Vector4};
