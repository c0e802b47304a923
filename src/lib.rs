// src/lib.rs
//! Topaz
//!
//! GPU resource management for a real-time 3D engine: typed buffers with
//! scoped mapped views, vertex formats, objects, shader programs that track
//! their uniforms, textures and a draw device, all on top of a pluggable
//! [`gfx::Driver`].

pub mod gfx;
pub mod logging;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use gfx::{initialise, ContextConfig, Error, GraphicsContext, HeadlessDriver, Result};
pub use logging::{init_logging, LoggingConfig};

/// Starts a graphics context on the calling thread backed by the headless
/// driver, with default limits.
pub fn headless() -> Result<GraphicsContext> {
    initialise(HeadlessDriver::new(), ContextConfig::default())
}
