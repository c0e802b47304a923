//! Graphics context and driver-bound state
//!
//! The driver is a singleton state machine: whatever was bound last is what
//! the next call operates on. This module owns that state explicitly. A
//! context is installed for the calling thread by [`initialise`] and lives
//! until the returned [`GraphicsContext`] guard is dropped; every resource
//! wrapper reaches the driver through it, and every bind goes through it so
//! the [`bound`] queries always reflect the driver.
//!
//! There is no save/restore. Last bind wins, and callers re-bind before any
//! operation that depends on a specific resource being current.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::config::{ContextConfig, Limits};
use super::driver::{BufferType, Driver, TextureTarget};
use super::error::{Error, Result};
use super::handle::{
    BufferHandle, FramebufferHandle, ProgramHandle, ShaderHandle, TextureHandle, VertexArrayHandle,
};

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// Snapshot of what is currently bound in the driver.
#[derive(Debug, Clone, Default)]
pub struct BoundState {
    object: VertexArrayHandle,
    program: ProgramHandle,
    buffers: [BufferHandle; 3],
    active_unit: u32,
    textures: HashMap<(u32, TextureTarget), TextureHandle>,
    framebuffer: FramebufferHandle,
}

impl BoundState {
    pub fn object(&self) -> VertexArrayHandle {
        self.object
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn buffer(&self, target: BufferType) -> BufferHandle {
        self.buffers[target.slot()]
    }

    pub fn active_texture_unit(&self) -> u32 {
        self.active_unit
    }

    pub fn texture(&self, unit: u32, target: TextureTarget) -> TextureHandle {
        self.textures
            .get(&(unit, target))
            .copied()
            .unwrap_or(TextureHandle::NONE)
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }
}

pub(crate) struct Context {
    driver: Box<dyn Driver>,
    limits: Limits,
    config: ContextConfig,
    bound: BoundState,
}

impl Context {
    pub(crate) fn driver(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    pub(crate) fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn bound(&self) -> &BoundState {
        &self.bound
    }

    fn redundant(&self, what: &str, id: u32) {
        if self.config.warn_on_redundant_bind {
            log::debug!("Skipped redundant bind of {} {}", what, id);
        }
    }

    pub(crate) fn bind_object(&mut self, vertex_array: VertexArrayHandle) -> Result<()> {
        if self.bound.object == vertex_array {
            self.redundant("object", vertex_array.id());
            return Ok(());
        }
        self.driver.bind_vertex_array(vertex_array)?;
        self.bound.object = vertex_array;
        Ok(())
    }

    pub(crate) fn bind_program(&mut self, program: ProgramHandle) -> Result<()> {
        if self.bound.program == program {
            self.redundant("program", program.id());
            return Ok(());
        }
        self.driver.use_program(program)?;
        self.bound.program = program;
        Ok(())
    }

    pub(crate) fn bind_buffer(&mut self, target: BufferType, buffer: BufferHandle) -> Result<()> {
        if self.bound.buffers[target.slot()] == buffer {
            self.redundant("buffer", buffer.id());
            return Ok(());
        }
        self.driver.bind_buffer(target, buffer)?;
        self.bound.buffers[target.slot()] = buffer;
        Ok(())
    }

    /// Attaches a uniform buffer to an indexed binding point. This also
    /// makes it the buffer bound to the uniform target.
    pub(crate) fn bind_buffer_base(&mut self, buffer: BufferHandle, binding: u32) -> Result<()> {
        self.driver.bind_buffer_base(buffer, binding)?;
        self.bound.buffers[BufferType::Uniform.slot()] = buffer;
        Ok(())
    }

    pub(crate) fn bind_texture(
        &mut self,
        unit: u32,
        target: TextureTarget,
        texture: TextureHandle,
    ) -> Result<()> {
        if unit >= self.limits.max_texture_units {
            return Err(Error::TextureUnitOutOfRange {
                unit,
                count: self.limits.max_texture_units,
            });
        }
        if self.bound.active_unit != unit {
            self.driver.active_texture(unit)?;
            self.bound.active_unit = unit;
        }
        if self.bound.texture(unit, target) == texture {
            self.redundant("texture", texture.id());
            return Ok(());
        }
        self.driver.bind_texture(target, texture)?;
        self.bound.textures.insert((unit, target), texture);
        Ok(())
    }

    pub(crate) fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) -> Result<()> {
        if self.bound.framebuffer == framebuffer {
            self.redundant("framebuffer", framebuffer.id());
            return Ok(());
        }
        self.driver.bind_framebuffer(framebuffer)?;
        self.bound.framebuffer = framebuffer;
        Ok(())
    }

    // Deleting a bound resource reverts that binding point to zero in the
    // driver, so the tracked state follows.

    pub(crate) fn release_buffer(&mut self, buffer: BufferHandle) {
        self.driver.delete_buffer(buffer);
        for bound in self.bound.buffers.iter_mut() {
            if *bound == buffer {
                *bound = BufferHandle::NONE;
            }
        }
    }

    pub(crate) fn release_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.driver.delete_vertex_array(vertex_array);
        if self.bound.object == vertex_array {
            self.bound.object = VertexArrayHandle::NONE;
        }
    }

    pub(crate) fn release_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if program.is_some() {
            self.driver.detach_shader(program, shader);
        }
        self.driver.delete_shader(shader);
    }

    pub(crate) fn release_program(&mut self, program: ProgramHandle) {
        self.driver.delete_program(program);
        if self.bound.program == program {
            self.bound.program = ProgramHandle::NONE;
        }
    }

    pub(crate) fn release_texture(&mut self, texture: TextureHandle) {
        self.driver.delete_texture(texture);
        self.bound.textures.retain(|_, bound| *bound != texture);
    }

    pub(crate) fn release_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.driver.delete_framebuffer(framebuffer);
        if self.bound.framebuffer == framebuffer {
            self.bound.framebuffer = FramebufferHandle::NONE;
        }
    }
}

/// Guard for the graphics context of the current thread.
///
/// Dropping it terminates the context. Resources that outlive it skip their
/// driver release (the driver itself is gone by then).
#[derive(Debug)]
pub struct GraphicsContext {
    driver_name: String,
    // The context is per thread; the guard must stay on it.
    _not_send: PhantomData<*const ()>,
}

impl GraphicsContext {
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        let terminated = CURRENT
            .try_with(|current| current.try_borrow_mut().map(|mut c| c.take()).ok())
            .ok()
            .flatten()
            .flatten();
        match terminated {
            Some(context) => {
                drop(context);
                log::info!("Terminated graphics context ({})", self.driver_name);
            }
            None => log::warn!(
                "Graphics context ({}) was already gone at termination",
                self.driver_name
            ),
        }
    }
}

/// Installs `driver` as the graphics context of the calling thread.
pub fn initialise<D: Driver + 'static>(driver: D, config: ContextConfig) -> Result<GraphicsContext> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        if current.is_some() {
            log::error!("Initialisation of graphics context aborted: one is already active");
            return Err(Error::ContextAlreadyActive);
        }
        let driver_name = driver.name().to_owned();
        let limits = config.effective_limits(driver.limits());
        log::info!(
            "Initialised graphics context ({}): {} uniform locations, {} texture units, {} vertex attributes",
            driver_name,
            limits.max_uniform_locations,
            limits.max_texture_units,
            limits.max_vertex_attributes
        );
        *current = Some(Context {
            driver: Box::new(driver),
            limits,
            config,
            bound: BoundState::default(),
        });
        Ok(GraphicsContext {
            driver_name,
            _not_send: PhantomData,
        })
    })
}

/// Returns true if a graphics context is active on this thread.
pub fn is_active() -> bool {
    CURRENT
        .try_with(|current| current.try_borrow().map(|c| c.is_some()).unwrap_or(false))
        .unwrap_or(false)
}

/// Limits of the active context, if any.
pub fn limits() -> Option<Limits> {
    query(|context| context.limits)
}

/// Runs `f` against the raw driver of the active context.
///
/// Anything bound through this escape hatch is invisible to [`bound`].
pub fn with_driver<R>(f: impl FnOnce(&mut dyn Driver) -> R) -> Result<R> {
    with(|context| Ok(f(context.driver())))
}

pub(crate) fn with<R>(f: impl FnOnce(&mut Context) -> Result<R>) -> Result<R> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        match current.as_mut() {
            Some(context) => f(context),
            None => {
                log::error!("Graphics operation attempted with no active context");
                Err(Error::NoContext)
            }
        }
    })
}

/// Runs a driver release from a destructor. Never panics; if the context is
/// gone (or busy) the release is skipped with a warning.
pub(crate) fn release(what: &str, f: impl FnOnce(&mut Context)) {
    let released = CURRENT
        .try_with(|current| match current.try_borrow_mut() {
            Ok(mut current) => match current.as_mut() {
                Some(context) => {
                    f(context);
                    true
                }
                None => false,
            },
            Err(_) => false,
        })
        .unwrap_or(false);
    if !released {
        log::warn!("{} outlived its graphics context; driver release skipped", what);
    }
}

fn query<R>(f: impl FnOnce(&Context) -> R) -> Option<R> {
    CURRENT
        .try_with(|current| {
            current
                .try_borrow()
                .ok()
                .and_then(|current| current.as_ref().map(f))
        })
        .ok()
        .flatten()
}

/// Queries of the driver's currently bound resources.
///
/// Every query returns the zero handle when nothing is bound or no context
/// is active.
pub mod bound {
    use super::*;

    pub fn object() -> VertexArrayHandle {
        query(|c| c.bound.object()).unwrap_or_default()
    }

    pub fn program() -> ProgramHandle {
        query(|c| c.bound.program()).unwrap_or_default()
    }

    pub fn buffer(target: BufferType) -> BufferHandle {
        query(|c| c.bound.buffer(target)).unwrap_or_default()
    }

    pub fn active_texture_unit() -> u32 {
        query(|c| c.bound.active_texture_unit()).unwrap_or(0)
    }

    pub fn texture(unit: u32, target: TextureTarget) -> TextureHandle {
        query(|c| c.bound.texture(unit, target)).unwrap_or_default()
    }

    pub fn framebuffer() -> FramebufferHandle {
        query(|c| c.bound.framebuffer()).unwrap_or_default()
    }

    /// Full snapshot of the bound state.
    pub fn snapshot() -> BoundState {
        query(|c| c.bound().clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::driver::HeadlessDriver;

    #[test]
    fn test_initialise_twice_fails() {
        let _gfx = initialise(HeadlessDriver::new(), ContextConfig::default()).unwrap();
        assert!(is_active());
        let second = initialise(HeadlessDriver::new(), ContextConfig::default());
        assert!(matches!(second, Err(Error::ContextAlreadyActive)));
    }

    #[test]
    fn test_drop_guard_terminates() {
        {
            let gfx = initialise(HeadlessDriver::new(), ContextConfig::default()).unwrap();
            assert_eq!(gfx.driver_name(), "headless");
        }
        assert!(!is_active());
        assert!(matches!(with(|_| Ok(())), Err(Error::NoContext)));
    }

    #[test]
    fn test_queries_without_context_are_zero() {
        assert!(bound::object().is_none());
        assert!(bound::program().is_none());
        assert!(limits().is_none());
    }

    #[test]
    fn test_texture_unit_range_enforced() {
        let _gfx = initialise(HeadlessDriver::new(), ContextConfig::default()).unwrap();
        let result = with(|c| c.bind_texture(32, TextureTarget::Texture2D, TextureHandle::NONE));
        assert!(matches!(
            result,
            Err(Error::TextureUnitOutOfRange { unit: 32, count: 32 })
        ));
    }

    #[test]
    fn test_release_clears_binding() {
        let _gfx = initialise(HeadlessDriver::new(), ContextConfig::default()).unwrap();
        let vao = with(|c| Ok(c.driver().create_vertex_array()?)).unwrap();
        with(|c| c.bind_object(vao)).unwrap();
        assert_eq!(bound::object(), vao);
        release("test object", |c| c.release_vertex_array(vao));
        assert!(bound::object().is_none());
    }
}
