//! Shader programs and uniforms

mod program;
mod source;
mod uniform;

pub use program::{Shader, ShaderProgram};
pub use source::{pass_through, stage_path};
pub use uniform::{Uniform, UniformType, UniformValue};
