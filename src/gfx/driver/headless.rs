//! In-memory driver
//!
//! `HeadlessDriver` implements the whole [`Driver`] surface on plain Rust
//! collections. Buffers are byte vectors, textures keep their pixels and
//! draws are assembled from the bound vertex array exactly as a rasteriser
//! would read them, then handed to a [`Recorder`] instead of the screen.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::glsl::{self, UniformDecl};
use super::{
    Attachment, AttributePointer, BufferType, ClearMask, ComponentType, CubeFace, DrawMode, Driver,
    DriverError, DriverResult, ProgramStatus, ShaderType, TextureFormat, TextureParameters,
    TextureTarget,
};
use crate::gfx::config::Limits;
use crate::gfx::handle::{
    BufferHandle, FramebufferHandle, ProgramHandle, ShaderHandle, TextureHandle, VertexArrayHandle,
};
use crate::gfx::shader::UniformValue;

/// One indexed draw as the driver assembled it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mode: DrawMode,
    pub program: ProgramHandle,
    pub vertex_array: VertexArrayHandle,
    /// Indices read from the element buffer.
    pub indices: Vec<u32>,
    /// Per attribute index, the decoded components of every drawn vertex.
    pub attributes: BTreeMap<u32, Vec<Vec<f32>>>,
}

impl DrawCall {
    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.mode.vertices_per_primitive()
    }

    pub fn attribute(&self, index: u32) -> Option<&[Vec<f32>]> {
        self.attributes.get(&index).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRecord {
    pub framebuffer: FramebufferHandle,
    pub colour: [f32; 4],
    pub mask: ClearMask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformPush {
    pub program: ProgramHandle,
    pub name: String,
    pub value: UniformValue,
}

#[derive(Debug, Default)]
struct Recording {
    draw_calls: Vec<DrawCall>,
    clears: Vec<ClearRecord>,
    uniform_pushes: Vec<UniformPush>,
}

/// Shared view of everything a [`HeadlessDriver`] has drawn, cleared and
/// pushed. Clone it before handing the driver to a context.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Rc<RefCell<Recording>>,
}

impl Recorder {
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.inner.borrow().draw_calls.clone()
    }

    pub fn clears(&self) -> Vec<ClearRecord> {
        self.inner.borrow().clears.clone()
    }

    pub fn uniform_pushes(&self) -> Vec<UniformPush> {
        self.inner.borrow().uniform_pushes.clone()
    }

    /// The most recent value pushed to `name` on `program`.
    pub fn last_uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.inner
            .borrow()
            .uniform_pushes
            .iter()
            .rev()
            .find(|push| push.program == program && push.name == name)
            .map(|push| push.value)
    }

    pub fn reset(&self) {
        let mut recording = self.inner.borrow_mut();
        recording.draw_calls.clear();
        recording.clears.clear();
        recording.uniform_pushes.clear();
    }
}

#[derive(Debug)]
struct BufferState {
    data: Vec<u8>,
    immutable: bool,
    mapped: bool,
}

#[derive(Debug, Default)]
struct VertexArrayState {
    attributes: BTreeMap<u32, (BufferHandle, AttributePointer)>,
    element_buffer: BufferHandle,
}

#[derive(Debug)]
struct ShaderState {
    ty: ShaderType,
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Debug, Default)]
struct ProgramState {
    shaders: Vec<ShaderHandle>,
    attribute_bindings: HashMap<String, u32>,
    linked: bool,
    validated: bool,
    info_log: String,
    /// Location of a uniform is its position in this list.
    uniforms: Vec<UniformDecl>,
    values: HashMap<u32, UniformValue>,
}

#[derive(Debug)]
struct TextureState {
    target: TextureTarget,
    format: Option<TextureFormat>,
    width: u32,
    height: u32,
    faces: Vec<Option<Vec<u8>>>,
    parameters: TextureParameters,
    mipmapped: bool,
}

#[derive(Debug, Default)]
struct FramebufferState {
    attachments: HashMap<Attachment, TextureHandle>,
}

/// Complete in-memory [`Driver`].
#[derive(Debug)]
pub struct HeadlessDriver {
    limits: Limits,
    next_id: u32,
    buffers: HashMap<BufferHandle, BufferState>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayState>,
    shaders: HashMap<ShaderHandle, ShaderState>,
    programs: HashMap<ProgramHandle, ProgramState>,
    textures: HashMap<TextureHandle, TextureState>,
    framebuffers: HashMap<FramebufferHandle, FramebufferState>,
    bound_buffers: [BufferHandle; 3],
    uniform_bindings: HashMap<u32, BufferHandle>,
    bound_vertex_array: VertexArrayHandle,
    bound_program: ProgramHandle,
    active_unit: u32,
    bound_textures: HashMap<(u32, TextureTarget), TextureHandle>,
    bound_framebuffer: FramebufferHandle,
    clear_colour: [f32; 4],
    recorder: Recorder,
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            next_id: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_buffers: [BufferHandle::NONE; 3],
            uniform_bindings: HashMap::new(),
            bound_vertex_array: VertexArrayHandle::NONE,
            bound_program: ProgramHandle::NONE,
            active_unit: 0,
            bound_textures: HashMap::new(),
            bound_framebuffer: FramebufferHandle::NONE,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            recorder: Recorder::default(),
        }
    }

    /// Handle onto this driver's recording.
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// Number of live driver resources of every kind.
    pub fn live_resources(&self) -> usize {
        self.buffers.len()
            + self.vertex_arrays.len()
            + self.shaders.len()
            + self.programs.len()
            + self.textures.len()
            + self.framebuffers.len()
    }

    /// Current value of a uniform as the driver holds it.
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let location = self.uniform_location(program, name)?;
        self.programs.get(&program)?.values.get(&location).copied()
    }

    /// Location bound to attribute `name` before the last link.
    pub fn attribute_binding(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .attribute_bindings
            .get(name)
            .copied()
    }

    /// Buffer attached to uniform binding point `binding`.
    pub fn uniform_binding(&self, binding: u32) -> BufferHandle {
        self.uniform_bindings
            .get(&binding)
            .copied()
            .unwrap_or_default()
    }

    /// Dimensions, sampling state and mipmap status of a texture.
    pub fn texture_info(
        &self,
        texture: TextureHandle,
    ) -> Option<(u32, u32, TextureParameters, bool)> {
        self.textures
            .get(&texture)
            .map(|state| (state.width, state.height, state.parameters, state.mipmapped))
    }

    fn next_raw(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn buffer(&self, buffer: BufferHandle) -> DriverResult<&BufferState> {
        self.buffers
            .get(&buffer)
            .ok_or_else(|| DriverError::InvalidHandle(format!("buffer {}", buffer)))
    }

    fn buffer_mut(&mut self, buffer: BufferHandle) -> DriverResult<&mut BufferState> {
        self.buffers
            .get_mut(&buffer)
            .ok_or_else(|| DriverError::InvalidHandle(format!("buffer {}", buffer)))
    }

    fn program(&self, program: ProgramHandle) -> DriverResult<&ProgramState> {
        self.programs
            .get(&program)
            .ok_or_else(|| DriverError::InvalidHandle(format!("program {}", program)))
    }

    fn program_mut(&mut self, program: ProgramHandle) -> DriverResult<&mut ProgramState> {
        self.programs
            .get_mut(&program)
            .ok_or_else(|| DriverError::InvalidHandle(format!("program {}", program)))
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> DriverResult<&mut TextureState> {
        self.textures
            .get_mut(&texture)
            .ok_or_else(|| DriverError::InvalidHandle(format!("texture {}", texture)))
    }

    /// Runs the link checks over the stages attached to `program` and
    /// returns the merged uniform declarations.
    fn link_stages(&self, program: &ProgramState) -> Result<Vec<UniformDecl>, String> {
        if program.shaders.is_empty() {
            return Err("error: no shader stages attached".to_owned());
        }

        let mut stages = Vec::with_capacity(program.shaders.len());
        for handle in &program.shaders {
            let shader = self
                .shaders
                .get(handle)
                .ok_or_else(|| format!("error: attached shader {} no longer exists", handle))?;
            if !shader.compiled {
                return Err(format!("error: {} shader is not compiled", shader.ty));
            }
            stages.push(shader);
        }

        let has = |ty: ShaderType| stages.iter().any(|shader| shader.ty == ty);
        if !has(ShaderType::Vertex) {
            return Err("error: a vertex shader is required".to_owned());
        }
        if has(ShaderType::TessellationControl) && !has(ShaderType::TessellationEvaluation) {
            return Err(
                "error: tessellation control shader requires a tessellation evaluation shader"
                    .to_owned(),
            );
        }

        let mut uniforms: Vec<UniformDecl> = Vec::new();
        for shader in stages {
            for decl in glsl::uniform_declarations(&shader.source) {
                match uniforms.iter().find(|known| known.name == decl.name) {
                    Some(known) if known.glsl_type != decl.glsl_type => {
                        return Err(format!(
                            "error: uniform '{}' declared as both {} and {}",
                            decl.name, known.glsl_type, decl.glsl_type
                        ))
                    }
                    Some(_) => {}
                    None => uniforms.push(decl),
                }
            }
        }
        Ok(uniforms)
    }

    fn assemble(&self, mode: DrawMode, count: usize, first: usize) -> DriverResult<DrawCall> {
        let vertex_array = self
            .vertex_arrays
            .get(&self.bound_vertex_array)
            .ok_or_else(|| DriverError::InvalidOperation("no vertex array bound".to_owned()))?;

        match self.programs.get(&self.bound_program) {
            Some(program) if program.linked => {}
            _ => {
                return Err(DriverError::InvalidOperation(
                    "no linked program in use".to_owned(),
                ))
            }
        }

        if self.buffers.values().any(|buffer| buffer.mapped) {
            return Err(DriverError::InvalidOperation(
                "draw issued while a buffer is mapped".to_owned(),
            ));
        }

        if vertex_array.element_buffer.is_none() {
            return Err(DriverError::InvalidOperation(
                "vertex array has no element buffer".to_owned(),
            ));
        }
        let elements = self.buffer(vertex_array.element_buffer)?;
        let start = first * 4;
        let end = (first + count) * 4;
        if end > elements.data.len() {
            return Err(DriverError::InvalidOperation(format!(
                "draw reads elements {}..{} past the end of a {} byte element buffer",
                first,
                first + count,
                elements.data.len()
            )));
        }
        let indices: Vec<u32> = bytemuck::pod_collect_to_vec(&elements.data[start..end]);

        let mut attributes = BTreeMap::new();
        for (&index, (buffer, pointer)) in &vertex_array.attributes {
            let data = &self.buffer(*buffer)?.data;
            let width = pointer.components as usize * pointer.component_type.size();
            let stride = if pointer.stride == 0 { width } else { pointer.stride };

            let mut vertices = Vec::with_capacity(indices.len());
            for &vertex in &indices {
                let at = vertex as usize * stride + pointer.offset;
                let bytes = data.get(at..at + width).ok_or_else(|| {
                    DriverError::InvalidOperation(format!(
                        "attribute {} of vertex {} reads past the end of buffer {}",
                        index, vertex, buffer
                    ))
                })?;
                let components = bytes
                    .chunks_exact(pointer.component_type.size())
                    .map(|bytes| decode_component(pointer.component_type, bytes, pointer.normalised))
                    .collect();
                vertices.push(components);
            }
            attributes.insert(index, vertices);
        }

        Ok(DrawCall {
            mode,
            program: self.bound_program,
            vertex_array: self.bound_vertex_array,
            indices,
            attributes,
        })
    }
}

fn decode_component(ty: ComponentType, bytes: &[u8], normalised: bool) -> f32 {
    use bytemuck::pod_read_unaligned as read;

    match ty {
        ComponentType::Byte => {
            let value = read::<i8>(bytes) as f32;
            if normalised {
                (value / i8::MAX as f32).max(-1.0)
            } else {
                value
            }
        }
        ComponentType::UnsignedByte => {
            let value = read::<u8>(bytes) as f32;
            if normalised {
                value / u8::MAX as f32
            } else {
                value
            }
        }
        ComponentType::Short => {
            let value = read::<i16>(bytes) as f32;
            if normalised {
                (value / i16::MAX as f32).max(-1.0)
            } else {
                value
            }
        }
        ComponentType::UnsignedShort => {
            let value = read::<u16>(bytes) as f32;
            if normalised {
                value / u16::MAX as f32
            } else {
                value
            }
        }
        ComponentType::Int => {
            let value = read::<i32>(bytes);
            if normalised {
                (value as f64 / i32::MAX as f64).max(-1.0) as f32
            } else {
                value as f32
            }
        }
        ComponentType::UnsignedInt => {
            let value = read::<u32>(bytes);
            if normalised {
                (value as f64 / u32::MAX as f64) as f32
            } else {
                value as f32
            }
        }
        ComponentType::Float => read::<f32>(bytes),
        ComponentType::Double => read::<f64>(bytes) as f32,
    }
}

impl Driver for HeadlessDriver {
    fn name(&self) -> &str {
        "headless"
    }

    fn limits(&self) -> Limits {
        self.limits
    }

    fn create_buffer(&mut self) -> DriverResult<BufferHandle> {
        let handle = BufferHandle::from_raw(self.next_raw());
        self.buffers.insert(
            handle,
            BufferState {
                data: Vec::new(),
                immutable: false,
                mapped: false,
            },
        );
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            return;
        }
        for bound in self.bound_buffers.iter_mut() {
            if *bound == buffer {
                *bound = BufferHandle::NONE;
            }
        }
        self.uniform_bindings.retain(|_, bound| *bound != buffer);
        for vertex_array in self.vertex_arrays.values_mut() {
            vertex_array.attributes.retain(|_, (bound, _)| *bound != buffer);
            if vertex_array.element_buffer == buffer {
                vertex_array.element_buffer = BufferHandle::NONE;
            }
        }
    }

    fn bind_buffer(&mut self, target: BufferType, buffer: BufferHandle) -> DriverResult<()> {
        if buffer.is_some() {
            self.buffer(buffer)?;
        }
        self.bound_buffers[target.slot()] = buffer;
        Ok(())
    }

    fn buffer_storage(
        &mut self,
        buffer: BufferHandle,
        size: usize,
        immutable: bool,
    ) -> DriverResult<()> {
        let state = self.buffer_mut(buffer)?;
        if state.immutable {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} has immutable storage",
                buffer
            )));
        }
        if state.mapped {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} is mapped",
                buffer
            )));
        }
        state.data = vec![0; size];
        state.immutable = immutable;
        Ok(())
    }

    fn buffer_sub_data(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> DriverResult<()> {
        let state = self.buffer_mut(buffer)?;
        if state.mapped {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} is mapped",
                buffer
            )));
        }
        let end = offset + data.len();
        if end > state.data.len() {
            return Err(DriverError::InvalidValue(format!(
                "range {}..{} exceeds the {} byte storage of buffer {}",
                offset,
                end,
                state.data.len(),
                buffer
            )));
        }
        state.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferHandle) -> DriverResult<Vec<u8>> {
        let state = self.buffer_mut(buffer)?;
        if state.mapped {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} is already mapped",
                buffer
            )));
        }
        if state.data.is_empty() {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} has no storage to map",
                buffer
            )));
        }
        state.mapped = true;
        Ok(state.data.clone())
    }

    fn unmap_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> DriverResult<()> {
        let state = self.buffer_mut(buffer)?;
        if !state.mapped {
            return Err(DriverError::InvalidOperation(format!(
                "buffer {} is not mapped",
                buffer
            )));
        }
        state.mapped = false;
        if contents.len() != state.data.len() {
            return Err(DriverError::InvalidValue(format!(
                "{} bytes written back to a {} byte mapping",
                contents.len(),
                state.data.len()
            )));
        }
        state.data.copy_from_slice(contents);
        Ok(())
    }

    fn bind_buffer_base(&mut self, buffer: BufferHandle, binding: u32) -> DriverResult<()> {
        self.buffer(buffer)?;
        self.uniform_bindings.insert(binding, buffer);
        self.bound_buffers[BufferType::Uniform.slot()] = buffer;
        Ok(())
    }

    fn create_vertex_array(&mut self) -> DriverResult<VertexArrayHandle> {
        let handle = VertexArrayHandle::from_raw(self.next_raw());
        self.vertex_arrays.insert(handle, VertexArrayState::default());
        Ok(handle)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array).is_some()
            && self.bound_vertex_array == vertex_array
        {
            self.bound_vertex_array = VertexArrayHandle::NONE;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) -> DriverResult<()> {
        if vertex_array.is_some() && !self.vertex_arrays.contains_key(&vertex_array) {
            return Err(DriverError::InvalidHandle(format!(
                "vertex array {}",
                vertex_array
            )));
        }
        self.bound_vertex_array = vertex_array;
        Ok(())
    }

    fn vertex_array_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
        pointer: &AttributePointer,
    ) -> DriverResult<()> {
        self.buffer(buffer)?;
        if pointer.index >= self.limits.max_vertex_attributes {
            return Err(DriverError::InvalidValue(format!(
                "attribute index {} exceeds the {} supported attributes",
                pointer.index, self.limits.max_vertex_attributes
            )));
        }
        if !(1..=4).contains(&pointer.components) {
            return Err(DriverError::InvalidValue(format!(
                "attribute {} has {} components",
                pointer.index, pointer.components
            )));
        }
        let state = self.vertex_arrays.get_mut(&vertex_array).ok_or_else(|| {
            DriverError::InvalidHandle(format!("vertex array {}", vertex_array))
        })?;
        state.attributes.insert(pointer.index, (buffer, *pointer));
        Ok(())
    }

    fn disable_vertex_array_attribute(
        &mut self,
        vertex_array: VertexArrayHandle,
        index: u32,
    ) -> DriverResult<()> {
        let state = self.vertex_arrays.get_mut(&vertex_array).ok_or_else(|| {
            DriverError::InvalidHandle(format!("vertex array {}", vertex_array))
        })?;
        state.attributes.remove(&index);
        Ok(())
    }

    fn vertex_array_element_buffer(
        &mut self,
        vertex_array: VertexArrayHandle,
        buffer: BufferHandle,
    ) -> DriverResult<()> {
        if buffer.is_some() {
            self.buffer(buffer)?;
        }
        let state = self.vertex_arrays.get_mut(&vertex_array).ok_or_else(|| {
            DriverError::InvalidHandle(format!("vertex array {}", vertex_array))
        })?;
        state.element_buffer = buffer;
        Ok(())
    }

    fn create_shader(&mut self, ty: ShaderType) -> DriverResult<ShaderHandle> {
        let handle = ShaderHandle::from_raw(self.next_raw());
        self.shaders.insert(
            handle,
            ShaderState {
                ty,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
            },
        );
        Ok(handle)
    }

    fn shader_source(&mut self, shader: ShaderHandle, source: &str) -> DriverResult<()> {
        let state = self
            .shaders
            .get_mut(&shader)
            .ok_or_else(|| DriverError::InvalidHandle(format!("shader {}", shader)))?;
        state.source = source.to_owned();
        Ok(())
    }

    fn compile_shader(&mut self, shader: ShaderHandle) -> DriverResult<bool> {
        let state = self
            .shaders
            .get_mut(&shader)
            .ok_or_else(|| DriverError::InvalidHandle(format!("shader {}", shader)))?;
        match glsl::check_source(&state.source) {
            Ok(()) => {
                state.compiled = true;
                state.info_log.clear();
            }
            Err(log) => {
                state.compiled = false;
                state.info_log = log;
            }
        }
        Ok(state.compiled)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.shaders
            .get(&shader)
            .map(|state| state.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> DriverResult<ProgramHandle> {
        let handle = ProgramHandle::from_raw(self.next_raw());
        self.programs.insert(handle, ProgramState::default());
        Ok(handle)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) -> DriverResult<()> {
        if !self.shaders.contains_key(&shader) {
            return Err(DriverError::InvalidHandle(format!("shader {}", shader)));
        }
        let state = self.program_mut(program)?;
        if state.shaders.contains(&shader) {
            return Err(DriverError::InvalidOperation(format!(
                "shader {} is already attached to program {}",
                shader, program
            )));
        }
        state.shaders.push(shader);
        Ok(())
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if let Some(state) = self.programs.get_mut(&program) {
            state.shaders.retain(|attached| *attached != shader);
        }
    }

    fn bind_attribute_location(
        &mut self,
        program: ProgramHandle,
        index: u32,
        name: &str,
    ) -> DriverResult<()> {
        if index >= self.limits.max_vertex_attributes {
            return Err(DriverError::InvalidValue(format!(
                "attribute index {} exceeds the {} supported attributes",
                index, self.limits.max_vertex_attributes
            )));
        }
        if name.starts_with("gl_") {
            return Err(DriverError::InvalidOperation(format!(
                "'{}' is a reserved attribute name",
                name
            )));
        }
        self.program_mut(program)?
            .attribute_bindings
            .insert(name.to_owned(), index);
        Ok(())
    }

    fn link_program(&mut self, program: ProgramHandle) -> DriverResult<bool> {
        let result = self.link_stages(self.program(program)?);
        let state = self.program_mut(program)?;
        state.validated = false;
        state.values.clear();
        match result {
            Ok(uniforms) => {
                state.linked = true;
                state.uniforms = uniforms;
                state.info_log.clear();
            }
            Err(log) => {
                state.linked = false;
                state.uniforms.clear();
                state.info_log = log;
            }
        }
        Ok(state.linked)
    }

    fn validate_program(&mut self, program: ProgramHandle) -> DriverResult<bool> {
        let state = self.program_mut(program)?;
        state.validated = state.linked;
        if !state.validated {
            state.info_log = "error: program is not successfully linked".to_owned();
        }
        Ok(state.validated)
    }

    fn program_status(&self, program: ProgramHandle, status: ProgramStatus) -> bool {
        self.programs.get(&program).map_or(false, |state| match status {
            ProgramStatus::Link => state.linked,
            ProgramStatus::Validate => state.validated,
        })
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.programs
            .get(&program)
            .map(|state| state.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramHandle) -> DriverResult<()> {
        if program.is_some() && !self.program(program)?.linked {
            return Err(DriverError::InvalidOperation(format!(
                "program {} is not linked",
                program
            )));
        }
        self.bound_program = program;
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() && self.bound_program == program {
            self.bound_program = ProgramHandle::NONE;
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let state = self.programs.get(&program).filter(|state| state.linked)?;
        let name = name.strip_suffix("[0]").unwrap_or(name);
        state
            .uniforms
            .iter()
            .position(|decl| decl.name == name)
            .map(|location| location as u32)
    }

    fn push_uniform(
        &mut self,
        program: ProgramHandle,
        location: u32,
        value: &UniformValue,
    ) -> DriverResult<()> {
        let state = self.program_mut(program)?;
        if !state.linked {
            return Err(DriverError::InvalidOperation(format!(
                "program {} is not linked",
                program
            )));
        }
        let decl = state.uniforms.get(location as usize).ok_or_else(|| {
            DriverError::InvalidValue(format!(
                "no uniform at location {} of program {}",
                location, program
            ))
        })?;
        if !glsl::accepts(&decl.glsl_type, value.glsl_type()) {
            return Err(DriverError::InvalidOperation(format!(
                "uniform '{}' is declared as {}, cannot push a {}",
                decl.name,
                decl.glsl_type,
                value.glsl_type()
            )));
        }
        let name = decl.name.clone();
        state.values.insert(location, *value);
        self.recorder
            .inner
            .borrow_mut()
            .uniform_pushes
            .push(UniformPush {
                program,
                name,
                value: *value,
            });
        Ok(())
    }

    fn create_texture(&mut self, target: TextureTarget) -> DriverResult<TextureHandle> {
        let handle = TextureHandle::from_raw(self.next_raw());
        let faces = match target {
            TextureTarget::Texture2D => 1,
            TextureTarget::CubeMap => CubeFace::ALL.len(),
        };
        self.textures.insert(
            handle,
            TextureState {
                target,
                format: None,
                width: 0,
                height: 0,
                faces: vec![None; faces],
                parameters: TextureParameters::default(),
                mipmapped: false,
            },
        );
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            return;
        }
        self.bound_textures.retain(|_, bound| *bound != texture);
        for framebuffer in self.framebuffers.values_mut() {
            framebuffer.attachments.retain(|_, bound| *bound != texture);
        }
    }

    fn texture_image(
        &mut self,
        texture: TextureHandle,
        face: Option<CubeFace>,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> DriverResult<()> {
        let max = self.limits.max_texture_size;
        if width > max || height > max {
            return Err(DriverError::InvalidValue(format!(
                "{}x{} texture exceeds the maximum size of {}",
                width, height, max
            )));
        }
        let state = self.texture_mut(texture)?;
        let slot = match (state.target, face) {
            (TextureTarget::Texture2D, None) => 0,
            (TextureTarget::CubeMap, Some(face)) => face.index(),
            (target, face) => {
                return Err(DriverError::InvalidOperation(format!(
                    "face {:?} is not valid for a {:?} texture",
                    face, target
                )))
            }
        };
        let size = width as usize * height as usize * format.bytes_per_pixel();
        let pixels = match data {
            Some(data) if data.len() != size => {
                return Err(DriverError::InvalidValue(format!(
                    "{} bytes supplied for a {}x{} {:?} image",
                    data.len(),
                    width,
                    height,
                    format
                )))
            }
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        state.format = Some(format);
        state.width = width;
        state.height = height;
        state.faces[slot] = Some(pixels);
        state.mipmapped = false;
        Ok(())
    }

    fn texture_parameters(
        &mut self,
        texture: TextureHandle,
        parameters: &TextureParameters,
    ) -> DriverResult<()> {
        self.texture_mut(texture)?.parameters = *parameters;
        Ok(())
    }

    fn generate_mipmap(&mut self, texture: TextureHandle) -> DriverResult<()> {
        let state = self.texture_mut(texture)?;
        if state.faces.iter().all(Option::is_none) {
            return Err(DriverError::InvalidOperation(format!(
                "texture {} has no image to mipmap",
                texture
            )));
        }
        state.mipmapped = true;
        Ok(())
    }

    fn read_texture(
        &self,
        texture: TextureHandle,
        face: Option<CubeFace>,
    ) -> DriverResult<Vec<u8>> {
        let state = self
            .textures
            .get(&texture)
            .ok_or_else(|| DriverError::InvalidHandle(format!("texture {}", texture)))?;
        let slot = face.map_or(0, CubeFace::index);
        state
            .faces
            .get(slot)
            .and_then(Option::clone)
            .ok_or_else(|| {
                DriverError::InvalidOperation(format!("texture {} image is not allocated", texture))
            })
    }

    fn active_texture(&mut self, unit: u32) -> DriverResult<()> {
        if unit >= self.limits.max_texture_units {
            return Err(DriverError::InvalidValue(format!(
                "texture unit {} exceeds the {} supported units",
                unit, self.limits.max_texture_units
            )));
        }
        self.active_unit = unit;
        Ok(())
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: TextureHandle) -> DriverResult<()> {
        if texture.is_some() {
            let state = self
                .textures
                .get(&texture)
                .ok_or_else(|| DriverError::InvalidHandle(format!("texture {}", texture)))?;
            if state.target != target {
                return Err(DriverError::InvalidOperation(format!(
                    "texture {} is a {:?}, not a {:?}",
                    texture, state.target, target
                )));
            }
        }
        self.bound_textures.insert((self.active_unit, target), texture);
        Ok(())
    }

    fn create_framebuffer(&mut self) -> DriverResult<FramebufferHandle> {
        let handle = FramebufferHandle::from_raw(self.next_raw());
        self.framebuffers.insert(handle, FramebufferState::default());
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_some()
            && self.bound_framebuffer == framebuffer
        {
            self.bound_framebuffer = FramebufferHandle::NONE;
        }
    }

    fn framebuffer_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    ) -> DriverResult<()> {
        if !self.textures.contains_key(&texture) {
            return Err(DriverError::InvalidHandle(format!("texture {}", texture)));
        }
        let state = self.framebuffers.get_mut(&framebuffer).ok_or_else(|| {
            DriverError::InvalidHandle(format!("framebuffer {}", framebuffer))
        })?;
        state.attachments.insert(attachment, texture);
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> DriverResult<()> {
        if framebuffer.is_some() && !self.framebuffers.contains_key(&framebuffer) {
            return Err(DriverError::InvalidHandle(format!(
                "framebuffer {}",
                framebuffer
            )));
        }
        self.bound_framebuffer = framebuffer;
        Ok(())
    }

    fn clear_colour(&mut self, rgba: [f32; 4]) {
        self.clear_colour = rgba;
    }

    fn clear(&mut self, mask: ClearMask) -> DriverResult<()> {
        // Offscreen attachments are cleared in place; the window surface only
        // exists as the recording.
        if let Some(framebuffer) = self.framebuffers.get(&self.bound_framebuffer) {
            let colour = self.clear_colour.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for (attachment, texture) in &framebuffer.attachments {
                let Some(state) = self.textures.get_mut(texture) else {
                    continue;
                };
                let pixel: Vec<u8> = match (attachment, state.format) {
                    (Attachment::Colour(_), Some(TextureFormat::Rgba8 | TextureFormat::Srgba8))
                        if mask.colour =>
                    {
                        colour.to_vec()
                    }
                    (Attachment::Depth, Some(TextureFormat::Depth32Float)) if mask.depth => {
                        1.0f32.to_ne_bytes().to_vec()
                    }
                    _ => continue,
                };
                for face in state.faces.iter_mut().flatten() {
                    for chunk in face.chunks_exact_mut(pixel.len()) {
                        chunk.copy_from_slice(&pixel);
                    }
                }
            }
        }
        self.recorder.inner.borrow_mut().clears.push(ClearRecord {
            framebuffer: self.bound_framebuffer,
            colour: self.clear_colour,
            mask,
        });
        Ok(())
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize, first: usize) -> DriverResult<()> {
        let draw = self.assemble(mode, count, first)?;
        self.recorder.inner.borrow_mut().draw_calls.push(draw);
        Ok(())
    }
}
