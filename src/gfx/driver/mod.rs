//! Graphics driver boundary
//!
//! Everything in the resource layer talks to the GPU through the [`Driver`]
//! trait: an explicit-binding, explicit-state API in the style of a
//! conventional 3D graphics driver. Buffer, program and vertex-array edits
//! name their target handle directly, so uploads never disturb what is
//! currently bound; only `bind_*`/`use_program`/`active_texture` change the
//! driver's global state, and those calls are routed through
//! [`crate::gfx::context`] so the bound state is tracked in one place.
//!
//! [`HeadlessDriver`] is a complete in-memory implementation used for tests,
//! tools and demos. A native backend implements the same trait.

mod glsl;
mod headless;

use std::fmt;

use thiserror::Error;

use super::config::Limits;
use super::handle::{
    BufferHandle, FramebufferHandle, ProgramHandle, ShaderHandle, TextureHandle, VertexArrayHandle,
};
use super::shader::UniformValue;

pub use headless::{ClearRecord, DrawCall, HeadlessDriver, Recorder, UniformPush};

/// Errors reported by a driver call, carrying the driver's diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("driver is out of memory")]
    OutOfMemory,
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Buffer binding targets, one per buffer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Per-vertex attribute data (array buffer).
    Vertex,
    /// Element indices.
    Index,
    /// Uniform block storage.
    Uniform,
}

impl BufferType {
    pub const ALL: [BufferType; 3] = [BufferType::Vertex, BufferType::Index, BufferType::Uniform];

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferType::Vertex => "vertex",
            BufferType::Index => "index",
            BufferType::Uniform => "uniform",
        })
    }
}

/// Programmable pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderType {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
}

impl ShaderType {
    pub const ALL: [ShaderType; 5] = [
        ShaderType::Vertex,
        ShaderType::TessellationControl,
        ShaderType::TessellationEvaluation,
        ShaderType::Geometry,
        ShaderType::Fragment,
    ];

    /// Position of the stage in [`ShaderType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human readable label, e.g. "Tessellation Control".
    pub fn label(self) -> &'static str {
        match self {
            ShaderType::Vertex => "Vertex",
            ShaderType::TessellationControl => "Tessellation Control",
            ShaderType::TessellationEvaluation => "Tessellation Evaluation",
            ShaderType::Geometry => "Geometry",
            ShaderType::Fragment => "Fragment",
        }
    }

    /// Suffix appended to a base path when loading stage sources from disk.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ShaderType::Vertex => ".vertex.glsl",
            ShaderType::TessellationControl => ".tessellation_control.glsl",
            ShaderType::TessellationEvaluation => ".tessellation_evaluation.glsl",
            ShaderType::Geometry => ".geometry.glsl",
            ShaderType::Fragment => ".fragment.glsl",
        }
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scalar type of one vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    Double,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::Int | ComponentType::UnsignedInt | ComponentType::Float => 4,
            ComponentType::Double => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ComponentType::Float | ComponentType::Double)
    }
}

/// How the driver reads one attribute out of a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePointer {
    pub index: u32,
    pub components: u8,
    pub component_type: ComponentType,
    pub normalised: bool,
    /// Distance in bytes between consecutive vertices.
    pub stride: usize,
    /// Offset in bytes of the first component within a vertex.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    Link,
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    Triangles,
}

impl DrawMode {
    /// Number of indices consumed per primitive.
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            DrawMode::Points => 1,
            DrawMode::Lines => 2,
            DrawMode::Triangles => 3,
        }
    }
}

/// Which planes of the bound render target a clear touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearMask {
    pub colour: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearMask {
    pub const ALL: ClearMask = ClearMask {
        colour: true,
        depth: true,
        stencil: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

/// Faces of a cube map, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Right,
    Left,
    Top,
    Bottom,
    Back,
    Front,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Right,
        CubeFace::Left,
        CubeFace::Top,
        CubeFace::Bottom,
        CubeFace::Back,
        CubeFace::Front,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Storage format of a texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Srgba8,
    Rgba16Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Srgba8 | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapLinear,
}

impl FilterMode {
    pub fn uses_mipmaps(self) -> bool {
        matches!(
            self,
            FilterMode::NearestMipmapNearest | FilterMode::LinearMipmapLinear
        )
    }
}

/// Sampling state of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParameters {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
}

impl Default for TextureParameters {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
        }
    }
}

impl TextureParameters {
    /// Clamped, linearly filtered; used for render targets and text.
    pub fn clamped() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            ..Default::default()
        }
    }

    /// Clamped, nearest filtered; used for depth attachments.
    pub fn nearest_clamped() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
        }
    }

    pub fn with_mipmapping(mut self) -> Self {
        self.min_filter = FilterMode::LinearMipmapLinear;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Colour(u32),
    Depth,
}

/// The graphics API every resource wrapper is built on.
///
/// Handles returned by `create_*` are never zero. `delete_*` on an unknown
/// handle is ignored, matching conventional driver behaviour. Buffer mapping
/// hands out a copy of the buffer contents and takes the edited bytes back on
/// unmap; a native backend copies through its own mapped pointer.
pub trait Driver {
    /// Short name used in log output.
    fn name(&self) -> &str;
    fn limits(&self) -> Limits;

    // Buffers
    fn create_buffer(&mut self) -> DriverResult<BufferHandle>;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn bind_buffer(&mut self, target: BufferType, buffer: BufferHandle) -> DriverResult<()>;
    /// Allocates fresh storage of `size` bytes. `immutable` storage can never
    /// be reallocated.
    fn buffer_storage(
        &mut self,
        buffer: BufferHandle,
        size: usize,
        immutable: bool,
    ) -> DriverResult<()>;
    fn buffer_sub_data(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> DriverResult<()>;
    fn map_buffer(&mut self, buffer: BufferHandle) -> DriverResult<Vec<u8>>;
    fn unmap_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> DriverResult<()>;
    fn bind_buffer_base(&mut self, buffer: BufferHandle, binding: u32) -> DriverResult<()>;

    // Vertex arrays
    fn create_vertex_array(&mut self) -> DriverResult<VertexArrayHandle>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) -> DriverResult<()>;
    fn vertex_array_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        pointer: &AttributePointer,
    ) -> DriverResult<()>;
    fn disable_vertex_array_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        index: u32,
    ) -> DriverResult<()>;
    fn vertex_array_element_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> DriverResult<()>;

    // Shader stages
    fn create_shader(&mut self, ty: ShaderType) -> DriverResult<ShaderHandle>;
    fn shader_source(&mut self, shader: ShaderHandle, source: &str) -> DriverResult<()>;
    /// Returns the compile status.
    fn compile_shader(&mut self, shader: ShaderHandle) -> DriverResult<bool>;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&mut self, shader: ShaderHandle);

    // Programs
    fn create_program(&mut self) -> DriverResult<ProgramHandle>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> DriverResult<()>;
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        index: u32,
        name: &str,
    ) -> DriverResult<()>;
    /// Returns the link status.
    fn link_program(&mut self, program: ProgramHandle) -> DriverResult<bool>;
    /// Returns the validate status.
    fn validate_program(&mut self, program: ProgramHandle) -> DriverResult<bool>;
    fn program_status(&self, program: ProgramHandle, status: ProgramStatus) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn use_program(&mut self, program: ProgramHandle) -> DriverResult<()>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    fn push_uniform(
        &mut self,
        program: ProgramHandle,
        location: u32,
        value: &UniformValue,
    ) -> DriverResult<()>;

    // Textures
    fn create_texture(&mut self, target: TextureTarget) -> DriverResult<TextureHandle>;
    fn delete_texture(&mut self, texture: TextureHandle);
    /// Allocates (and optionally fills) one image of a texture. `face` is
    /// required for cube maps and must be `None` for 2D textures.
    fn texture_image(
        &mut self,
        texture: TextureHandle,
        face: Option<CubeFace>,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> DriverResult<()>;
    fn texture_parameters(
        &mut self,
        texture: TextureHandle,
        parameters: &TextureParameters,
    ) -> DriverResult<()>;
    fn generate_mipmap(&mut self, texture: TextureHandle) -> DriverResult<()>;
    fn read_texture(&self, texture: TextureHandle, face: Option<CubeFace>)
        -> DriverResult<Vec<u8>>;
    fn active_texture(&mut self, unit: u32) -> DriverResult<()>;
    fn bind_texture(&mut self, target: TextureTarget, texture: TextureHandle) -> DriverResult<()>;

    // Render targets
    fn create_framebuffer(&mut self) -> DriverResult<FramebufferHandle>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    fn framebuffer_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    ) -> DriverResult<()>;
    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> DriverResult<()>;
    fn clear_colour(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, mask: ClearMask) -> DriverResult<()>;

    // Drawing
    /// Issues an indexed draw of `count` `u32` indices starting at element
    /// `first`, using the bound vertex array and program.
    fn draw_elements(&mut self, mode: DrawMode, count: usize, first: usize) -> DriverResult<()>;
}
