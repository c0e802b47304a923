//! Shader programs
//!
//! A [`ShaderProgram`] owns up to five stages and a bounded table of
//! uniforms. It moves through compile, link and validate; only when all
//! three succeeded is it [`ready`](ShaderProgram::ready). Every failure on
//! the way is logged with the driver's diagnostic text and leaves the
//! program not ready, so callers check readiness before drawing with it.

use std::path::Path;

use super::source;
use super::uniform::{push_value, Uniform, UniformSlot, UniformType, UniformValue};
use crate::gfx::context::{self, bound};
use crate::gfx::driver::{ProgramStatus, ShaderType};
use crate::gfx::error::{Error, Result};
use crate::gfx::handle::{ProgramHandle, ShaderHandle};

/// Attribute locations bound before every link unless overridden.
const DEFAULT_ATTRIBUTES: [(&str, u32); 7] = [
    ("position", 0),
    ("texcoord", 1),
    ("normal", 2),
    ("tangent", 3),
    ("positions_instance", 4),
    ("rotations_instance", 5),
    ("scales_instance", 6),
];

/// One stage of a program. Created by [`ShaderProgram::emplace`]; the
/// driver-side shader is only created once non-empty source is compiled.
#[derive(Debug)]
pub struct Shader {
    ty: ShaderType,
    handle: ShaderHandle,
    source: String,
    compiled: bool,
}

impl Shader {
    fn new(ty: ShaderType) -> Self {
        Self {
            ty,
            handle: ShaderHandle::NONE,
            source: String::new(),
            compiled: false,
        }
    }

    pub fn shader_type(&self) -> ShaderType {
        self.ty
    }

    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the stage source. Takes effect on the next compile.
    pub fn upload_source(&mut self, source: impl Into<String>) -> &mut Self {
        self.source = source.into();
        self.compiled = false;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// True once the stage is attached to its program.
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }
}

/// A linked set of shader stages plus the uniforms pushed to them.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    stages: [Option<Shader>; 5],
    attributes: Vec<(String, u32)>,
    uniforms: Vec<UniformSlot>,
    uniform_capacity: usize,
    linked: bool,
    validated: bool,
}

impl ShaderProgram {
    /// Creates an empty program. The uniform table is bounded by the
    /// context's uniform-location limit.
    pub fn new() -> Result<Self> {
        let (handle, uniform_capacity) = context::with(|ctx| {
            let handle = ctx.driver().create_program()?;
            Ok((handle, ctx.limits().max_uniform_locations))
        })?;
        log::debug!("Created program {}", handle);

        Ok(Self {
            handle,
            stages: Default::default(),
            attributes: DEFAULT_ATTRIBUTES
                .iter()
                .map(|(name, index)| (name.to_string(), *index))
                .collect(),
            uniforms: Vec::new(),
            uniform_capacity,
            linked: false,
            validated: false,
        })
    }

    /// Builds a vertex + fragment program and runs it through compile, link
    /// and validate. Check [`ready`](Self::ready) on the result.
    pub fn from_sources(vertex: &str, fragment: &str) -> Result<Self> {
        Self::from_stages([
            (ShaderType::Vertex, vertex.to_owned()),
            (ShaderType::Fragment, fragment.to_owned()),
        ])
    }

    /// Builds a program from any set of stages.
    pub fn from_stages(stages: impl IntoIterator<Item = (ShaderType, String)>) -> Result<Self> {
        let mut program = Self::new()?;
        for (ty, source) in stages {
            program.emplace(ty).upload_source(source);
        }
        program.build()?;
        Ok(program)
    }

    /// Builds a program from the five sibling files of `base`
    /// (`base.vertex.glsl`, `base.fragment.glsl`, ...). Missing files are
    /// absent stages.
    pub fn from_file(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let mut stages = Vec::new();
        for ty in ShaderType::ALL {
            stages.push((ty, source::read_stage(base, ty)?));
        }
        let program = Self::from_stages(stages)?;
        if !program.ready() {
            log::error!("Program loaded from {} is not ready", base.display());
        }
        Ok(program)
    }

    /// Compiles every stage, then links and validates.
    pub(crate) fn build(&mut self) -> Result<bool> {
        if self.compile_all()? && self.link()? {
            self.validate()?;
        }
        Ok(self.ready())
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Creates the placeholder for `ty`, or returns the existing one.
    pub fn emplace(&mut self, ty: ShaderType) -> &mut Shader {
        self.stages[ty.index()].get_or_insert_with(|| Shader::new(ty))
    }

    pub fn shader(&self, ty: ShaderType) -> Option<&Shader> {
        self.stages[ty.index()].as_ref()
    }

    pub fn shader_mut(&mut self, ty: ShaderType) -> Option<&mut Shader> {
        self.stages[ty.index()].as_mut()
    }

    /// Compiles one stage and attaches it on success.
    ///
    /// An empty source skips the stage (logged, not an error) and the stage
    /// is never attached. A compile failure is logged with the driver's
    /// info log and reported as `Ok(false)`.
    pub fn compile(&mut self, ty: ShaderType) -> Result<bool> {
        let program = self.handle;
        let Some(shader) = self.stages[ty.index()].as_mut() else {
            log::info!("Program {} has no {} stage; compile skipped", program, ty);
            return Ok(false);
        };

        if shader.is_empty() {
            log::info!("{} shader source is empty; stage skipped", ty);
            shader.compiled = false;
            let handle = shader.handle.take();
            if handle.is_some() {
                context::with(|ctx| {
                    ctx.release_shader(program, handle);
                    Ok(())
                })?;
            }
            return Ok(false);
        }

        context::with(|ctx| {
            let newly_created = shader.handle.is_none();
            if newly_created {
                shader.handle = ctx.driver().create_shader(ty)?;
            }
            ctx.driver().shader_source(shader.handle, &shader.source)?;
            shader.compiled = ctx.driver().compile_shader(shader.handle)?;
            if newly_created {
                ctx.driver().attach_shader(program, shader.handle)?;
            }
            if !shader.compiled {
                log::error!(
                    "{} shader of program {} failed to compile:\n{}",
                    ty,
                    program,
                    ctx.driver().shader_info_log(shader.handle)
                );
            }
            Ok(shader.compiled)
        })
    }

    /// Compiles every emplaced stage. Returns [`is_compiled`](Self::is_compiled).
    pub fn compile_all(&mut self) -> Result<bool> {
        for ty in ShaderType::ALL {
            if self.stages[ty.index()].is_some() {
                self.compile(ty)?;
            }
        }
        Ok(self.is_compiled())
    }

    /// Links the attached stages, binding the registered attribute
    /// locations first.
    pub fn link(&mut self) -> Result<bool> {
        let handle = self.handle;
        let attributes = &self.attributes;
        let linked = context::with(|ctx| {
            let max_attributes = ctx.limits().max_vertex_attributes;
            for (name, index) in attributes.iter().filter(|(_, index)| *index < max_attributes) {
                ctx.driver().bind_attribute_location(handle, *index, name)?;
            }
            let linked = ctx.driver().link_program(handle)?;
            if !linked {
                log::error!(
                    "Program {} failed to link:\n{}",
                    handle,
                    ctx.driver().program_info_log(handle)
                );
            }
            Ok(linked)
        })?;

        self.linked = linked;
        self.validated = false;
        if linked {
            log::debug!("Linked program {}", handle);
        }
        Ok(linked)
    }

    pub fn validate(&mut self) -> Result<bool> {
        let handle = self.handle;
        self.validated = context::with(|ctx| {
            let validated = ctx.driver().validate_program(handle)?;
            if !validated {
                log::error!(
                    "Program {} failed validation:\n{}",
                    handle,
                    ctx.driver().program_info_log(handle)
                );
            }
            Ok(validated && ctx.driver().program_status(handle, ProgramStatus::Validate))
        })?;
        Ok(self.validated)
    }

    /// At least one stage compiled and no stage with source failed.
    pub fn is_compiled(&self) -> bool {
        let mut any = false;
        for shader in self.stages.iter().flatten() {
            if shader.is_empty() {
                continue;
            }
            if !shader.compiled {
                return false;
            }
            any = true;
        }
        any
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Compiled, linked and validated.
    pub fn ready(&self) -> bool {
        self.is_compiled() && self.linked && self.validated
    }

    fn has_stage(&self, ty: ShaderType) -> bool {
        self.shader(ty).map_or(false, Shader::is_attached)
    }

    pub fn has_vertex_shader(&self) -> bool {
        self.has_stage(ShaderType::Vertex)
    }

    pub fn has_tessellation_control_shader(&self) -> bool {
        self.has_stage(ShaderType::TessellationControl)
    }

    pub fn has_tessellation_evaluation_shader(&self) -> bool {
        self.has_stage(ShaderType::TessellationEvaluation)
    }

    pub fn has_geometry_shader(&self) -> bool {
        self.has_stage(ShaderType::Geometry)
    }

    pub fn has_fragment_shader(&self) -> bool {
        self.has_stage(ShaderType::Fragment)
    }

    /// Binds vertex attribute `name` to `index` from the next link on.
    pub fn register_attribute(&mut self, name: &str, index: u32) {
        self.attributes.retain(|(known, bound)| known != name && *bound != index);
        self.attributes.push((name.to_owned(), index));
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, index)| *index)
    }

    /// Makes this the driver's active program. Does not push uniforms; call
    /// [`update`](Self::update) as well.
    pub fn bind(&self) -> Result<()> {
        context::with(|ctx| ctx.bind_program(self.handle)).map_err(|error| {
            log::error!("Failed to bind program {}: {}", self.handle, error);
            error
        })
    }

    /// Clears the active program if it is this one.
    pub fn unbind(&self) -> Result<()> {
        context::with(|ctx| {
            if ctx.bound().program() == self.handle {
                ctx.bind_program(ProgramHandle::NONE)?;
            }
            Ok(())
        })
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some() && bound::program() == self.handle
    }

    /// Adds a uniform, or updates it if the name is already present.
    pub fn add_uniform<T: UniformType>(&mut self, name: &str, value: T) -> Result<()> {
        self.set_uniform(name, value)
    }

    /// Updates a uniform, adding it if the name is new. Storing a different
    /// type under an existing name is an error.
    pub fn set_uniform<T: UniformType>(&mut self, name: &str, value: T) -> Result<()> {
        let value = value.into_value();
        if let Some(slot) = self.uniforms.iter_mut().find(|slot| slot.name == name) {
            if slot.value.glsl_type() != T::GLSL_TYPE {
                log::error!(
                    "Uniform '{}' of program {} holds a {}, cannot store a {}",
                    name,
                    self.handle,
                    slot.value.glsl_type(),
                    T::GLSL_TYPE
                );
                return Err(Error::UniformTypeMismatch {
                    name: name.to_owned(),
                    expected: slot.value.glsl_type(),
                    actual: T::GLSL_TYPE,
                });
            }
            slot.value = value;
            return Ok(());
        }

        if self.uniforms.len() >= self.uniform_capacity {
            log::error!(
                "Uniform table of program {} is full ({} entries); '{}' not added",
                self.handle,
                self.uniform_capacity,
                name
            );
            return Err(Error::UniformTableFull {
                capacity: self.uniform_capacity,
            });
        }
        self.uniforms.push(UniformSlot {
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    /// Removes a uniform. Removing an absent name warns and returns false.
    pub fn remove_uniform(&mut self, name: &str) -> bool {
        match self.uniforms.iter().position(|slot| slot.name == name) {
            Some(index) => {
                self.uniforms.remove(index);
                true
            }
            None => {
                log::warn!(
                    "Uniform '{}' is not part of program {}; nothing removed",
                    name,
                    self.handle
                );
                false
            }
        }
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.iter().any(|slot| slot.name == name)
    }

    /// Stored value of a uniform, if present with type `T`.
    pub fn uniform_value<T: UniformType>(&self, name: &str) -> Option<T> {
        self.uniforms
            .iter()
            .find(|slot| slot.name == name)
            .and_then(|slot| T::from_value(&slot.value))
    }

    /// Typed copy of a uniform entry.
    pub fn uniform<T: UniformType>(&self, name: &str) -> Option<Uniform<T>> {
        self.uniform_value(name)
            .map(|value| Uniform::new(self.handle, name, value))
    }

    pub fn number_active_uniforms(&self) -> usize {
        self.uniforms.len()
    }

    pub fn uniform_capacity(&self) -> usize {
        self.uniform_capacity
    }

    /// Uniform names in insertion order.
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.iter().map(|slot| slot.name.as_str())
    }

    /// Pushes every uniform to the driver in insertion order and returns
    /// how many were pushed. Names without a location are warned and
    /// skipped; a push the driver rejects is logged and the rest continue.
    pub fn update(&self) -> Result<usize> {
        if !self.linked {
            log::warn!("Program {} is not linked; uniform update skipped", self.handle);
            return Ok(0);
        }
        context::with(|ctx| {
            let mut pushed = 0;
            for slot in &self.uniforms {
                match push_value(ctx, self.handle, &slot.name, &slot.value) {
                    Ok(true) => pushed += 1,
                    Ok(false) => {}
                    Err(error) => log::error!(
                        "Failed to push uniform '{}' of program {}: {}",
                        slot.name,
                        self.handle,
                        error
                    ),
                }
            }
            Ok(pushed)
        })
    }

    /// Pushes a single stored uniform right away.
    pub fn push_uniform(&self, name: &str) -> Result<bool> {
        let Some(slot) = self.uniforms.iter().find(|slot| slot.name == name) else {
            log::warn!("Uniform '{}' is not part of program {}", name, self.handle);
            return Ok(false);
        };
        if !self.linked {
            return Ok(false);
        }
        context::with(|ctx| push_value(ctx, self.handle, &slot.name, &slot.value))
    }

    /// Raw view of the table, for diagnostics.
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms
            .iter()
            .map(|slot| (slot.name.as_str(), &slot.value))
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        let program = self.handle.take();
        if program.is_none() {
            return;
        }
        let shaders: Vec<ShaderHandle> = self
            .stages
            .iter_mut()
            .flatten()
            .map(|shader| shader.handle.take())
            .filter(|handle| handle.is_some())
            .collect();
        context::release("Shader program", |ctx| {
            for shader in shaders {
                ctx.release_shader(program, shader);
            }
            ctx.release_program(program);
        });
        log::debug!("Released program {}", program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::config::{ContextConfig, Limits};
    use crate::gfx::context::initialise;
    use crate::gfx::driver::HeadlessDriver;
    use crate::gfx::test_support::{capture_logs, headless, logged_warnings, FRAGMENT, VERTEX};
    use cgmath::{Matrix4, SquareMatrix, Vector3};

    #[test]
    fn test_vertex_fragment_program_is_ready() {
        let (_gfx, _) = headless();
        let program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        assert!(program.is_compiled());
        assert!(program.is_linked());
        assert!(program.is_validated());
        assert!(program.ready());
        assert!(program.has_vertex_shader());
        assert!(program.has_fragment_shader());
        assert!(!program.has_geometry_shader());
    }

    #[test]
    fn test_empty_fragment_stage_is_skipped() {
        let (_gfx, _) = headless();
        let program = ShaderProgram::from_sources(VERTEX, "").unwrap();
        assert!(!program.has_fragment_shader());
        assert!(program.shader(ShaderType::Fragment).is_some());
        assert!(program.ready());
    }

    #[test]
    fn test_malformed_source_is_not_ready() {
        let (_gfx, _) = headless();
        let program = ShaderProgram::from_sources(VERTEX, "void main() {").unwrap();
        assert!(!program.is_compiled());
        assert!(!program.ready());
        assert!(program.bind().is_err());
    }

    #[test]
    fn test_update_pushes_in_insertion_order() {
        let (_gfx, recorder) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        program.add_uniform("a", Matrix4::<f32>::identity()).unwrap();
        program.add_uniform("b", Vector3::new(0.0f32, 1.0, 0.0)).unwrap();
        program.add_uniform("c", 3i32).unwrap();
        // Lookups in another order must not affect the push order.
        assert_eq!(program.uniform_value::<i32>("c"), Some(3));
        assert!(program.has_uniform("a"));

        program.bind().unwrap();
        assert_eq!(program.update().unwrap(), 3);

        let names: Vec<_> = recorder
            .uniform_pushes()
            .into_iter()
            .map(|push| push.name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_unresolved_uniform_is_skipped() {
        let (_gfx, recorder) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        program.add_uniform("not_declared", 1.0f32).unwrap();
        program.add_uniform("c", 1i32).unwrap();
        assert_eq!(program.update().unwrap(), 1);
        assert_eq!(recorder.uniform_pushes().len(), 1);
    }

    #[test]
    fn test_push_of_absent_uniform_warns_and_returns_false() {
        let (_gfx, recorder) = headless();
        capture_logs();
        let program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        assert!(!program.push_uniform("never_added").unwrap());
        assert!(recorder.uniform_pushes().is_empty());
        assert!(logged_warnings().iter().any(|w| w.contains("never_added")));
    }

    #[test]
    fn test_remove_absent_uniform_keeps_count() {
        let (_gfx, _) = headless();
        let mut program = ShaderProgram::new().unwrap();
        program.add_uniform("a", 1.0f32).unwrap();
        assert!(!program.remove_uniform("never_added"));
        assert_eq!(program.number_active_uniforms(), 1);
        assert!(program.remove_uniform("a"));
        assert_eq!(program.number_active_uniforms(), 0);
    }

    #[test]
    fn test_set_uniform_updates_in_place() {
        let (_gfx, _) = headless();
        let mut program = ShaderProgram::new().unwrap();
        program.add_uniform("scale", 1.0f32).unwrap();
        program.set_uniform("scale", 2.0f32).unwrap();
        assert_eq!(program.number_active_uniforms(), 1);
        assert_eq!(program.uniform_value::<f32>("scale"), Some(2.0));
        assert_eq!(program.uniform_value::<i32>("scale"), None);
        assert!(matches!(
            program.set_uniform("scale", 1i32),
            Err(Error::UniformTypeMismatch { .. })
        ));
        assert_eq!(program.uniform::<f32>("scale").unwrap().name(), "scale");
    }

    #[test]
    fn test_uniform_table_overflow_is_reported() {
        let config =
            ContextConfig::new().with_limits(Limits::default().with_max_uniform_locations(2));
        let _gfx = initialise(HeadlessDriver::new(), config).unwrap();
        let mut program = ShaderProgram::new().unwrap();
        assert_eq!(program.uniform_capacity(), 2);
        program.add_uniform("a", 1.0f32).unwrap();
        program.add_uniform("b", 2.0f32).unwrap();
        assert!(matches!(
            program.add_uniform("c", 3.0f32),
            Err(Error::UniformTableFull { capacity: 2 })
        ));
        // Updating an existing entry still works at capacity.
        program.set_uniform("a", 4.0f32).unwrap();
        assert_eq!(program.number_active_uniforms(), 2);
    }

    #[test]
    fn test_bind_does_not_update() {
        let (_gfx, recorder) = headless();
        let mut program = ShaderProgram::from_sources(VERTEX, FRAGMENT).unwrap();
        program.add_uniform("c", 1i32).unwrap();
        program.bind().unwrap();
        assert!(program.is_bound());
        assert!(recorder.uniform_pushes().is_empty());
        program.unbind().unwrap();
        assert!(!program.is_bound());
    }

    #[test]
    fn test_registered_attributes() {
        let (_gfx, _) = headless();
        let mut program = ShaderProgram::new().unwrap();
        assert_eq!(program.attribute_location("position"), Some(0));
        program.register_attribute("vertex", 0);
        assert_eq!(program.attribute_location("vertex"), Some(0));
        assert_eq!(program.attribute_location("position"), None);
    }

    #[test]
    fn test_from_file_reads_sibling_stages() {
        let (_gfx, _) = headless();
        let dir = std::env::temp_dir().join(format!("topaz-shader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("flat");
        std::fs::write(source::stage_path(&base, ShaderType::Vertex), VERTEX).unwrap();
        std::fs::write(source::stage_path(&base, ShaderType::Fragment), FRAGMENT).unwrap();

        let program = ShaderProgram::from_file(&base).unwrap();
        assert!(program.ready());
        assert!(!program.has_tessellation_control_shader());
        assert!(!program.has_tessellation_evaluation_shader());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_pass_through_is_ready() {
        let (_gfx, _) = headless();
        let program = crate::gfx::shader::pass_through("position", "texcoord", "image").unwrap();
        assert!(program.ready());
    }
}
