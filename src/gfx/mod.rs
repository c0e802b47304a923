//! # Graphics Module
//!
//! The GPU resource layer: typed handles, buffers and their mapped views,
//! vertex formats, objects, shader programs with tracked uniforms, textures
//! and the device that issues draws.
//!
//! ## Architecture Overview
//!
//! - **Context** ([`context`]) - Thread-local driver ownership and bound state
//! - **Driver** ([`driver`]) - The graphics API boundary plus a headless backend
//! - **Resources** ([`resources`]) - Buffers, formats, objects, images and textures
//! - **Shaders** ([`shader`]) - Programs, stages and uniforms
//! - **Rendering** ([`rendering`]) - Render targets and the draw device
//!
//! ## Usage
//!
//! Every resource needs an active context on the calling thread:
//!
//! ```
//! use topaz::gfx::{self, fmt, kind, ContextConfig, HeadlessDriver, Object};
//!
//! let _gfx = gfx::initialise(HeadlessDriver::new(), ContextConfig::default())?;
//! let mut object = Object::new()?;
//! let slot = object.emplace_buffer::<kind::Vertex>()?;
//! object.get_mut::<kind::Vertex>(slot)?.resize(36)?;
//! object.format(slot, fmt::three_floats(0))?;
//! # Ok::<(), topaz::gfx::Error>(())
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod handle;
pub mod rendering;
pub mod resources;
pub mod shader;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{ContextConfig, Limits};
pub use context::{bound, initialise, is_active, GraphicsContext};
pub use driver::{
    BufferType, ComponentType, DrawMode, Driver, DriverError, HeadlessDriver, Recorder, ShaderType,
    TextureParameters,
};
pub use error::{Error, Result};
pub use handle::Handle;
pub use rendering::{Device, Frame, FrameBuffer, WindowFrame};
pub use resources::{
    fmt, kind, AnyBuffer, Buffer, CubeMap, DisplacementMap, Font, Format, Image, IndexBuffer,
    MappedView, NormalMap, Object, ParallaxMap, PixelRGBA8, Texture, TextureKind, UniformBuffer,
    VertexBuffer,
};
pub use shader::{pass_through, ShaderProgram, Uniform, UniformValue};
