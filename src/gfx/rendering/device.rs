//! Draw submission
//!
//! A [`Device`] pairs a render target with the program, object and index
//! buffer slot a draw reads from. It holds references only; reconfiguring it
//! never moves resources around.
//!
//! `render` binds nothing: the object and program must already be bound (and
//! the program's uniforms updated) by the caller, so each frame pays only for
//! the binds it asks for.

use super::frame::Frame;
use crate::gfx::context;
use crate::gfx::driver::DrawMode;
use crate::gfx::error::Result;
use crate::gfx::resources::{AnyBuffer, Object};
use crate::gfx::shader::ShaderProgram;

/// Indexed draws go through `u32` indices.
const INDEX_SIZE: usize = std::mem::size_of::<u32>();

pub struct Device<'a> {
    frame: &'a dyn Frame,
    program: &'a ShaderProgram,
    object: &'a Object,
    index_slot: Option<usize>,
    mode: DrawMode,
}

impl<'a> std::fmt::Debug for Device<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("frame", &self.frame.handle())
            .field("program", &self.program.handle())
            .field("object", &self.object.handle())
            .field("index_slot", &self.index_slot)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<'a> Device<'a> {
    /// Creates a device drawing triangles. The index slot starts unset.
    pub fn new(frame: &'a dyn Frame, program: &'a ShaderProgram, object: &'a Object) -> Self {
        Self {
            frame,
            program,
            object,
            index_slot: None,
            mode: DrawMode::Triangles,
        }
    }

    pub fn set_frame(&mut self, frame: &'a dyn Frame) {
        self.frame = frame;
    }

    pub fn set_program(&mut self, program: &'a ShaderProgram) {
        self.program = program;
    }

    pub fn set_object(&mut self, object: &'a Object) {
        self.object = object;
    }

    /// Selects the object slot holding the index buffer.
    pub fn set_handle(&mut self, index_slot: usize) {
        self.index_slot = Some(index_slot);
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    pub fn frame(&self) -> &'a dyn Frame {
        self.frame
    }

    pub fn program(&self) -> &'a ShaderProgram {
        self.program
    }

    pub fn object(&self) -> &'a Object {
        self.object
    }

    pub fn index_slot(&self) -> Option<usize> {
        self.index_slot
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.mode
    }

    /// Clears the device's render target.
    pub fn clear(&self) -> Result<()> {
        self.frame.clear()
    }

    /// Issues one indexed draw over the whole index buffer.
    ///
    /// Returns `Ok(false)` with a warning when the draw is skipped: the
    /// object is not bound, the index slot is unset or does not hold an
    /// index buffer, or the index buffer is empty.
    pub fn render(&self) -> Result<bool> {
        if !self.object.is_bound() {
            log::warn!(
                "Object {} is not bound; render skipped",
                self.object.handle()
            );
            return Ok(false);
        }

        let Some(slot) = self.index_slot else {
            log::warn!("Device has no index buffer slot; render skipped");
            return Ok(false);
        };
        let indices = match self.object.buffer(slot) {
            Some(AnyBuffer::Index(indices)) => indices,
            Some(other) => {
                log::warn!(
                    "Slot {} of object {} holds a {} buffer, not indices; render skipped",
                    slot,
                    self.object.handle(),
                    other.buffer_type()
                );
                return Ok(false);
            }
            None => {
                log::warn!(
                    "Object {} has no slot {}; render skipped",
                    self.object.handle(),
                    slot
                );
                return Ok(false);
            }
        };

        let count = indices.capacity() / INDEX_SIZE;
        if count == 0 {
            log::warn!("Index buffer of object {} is empty; render skipped", self.object.handle());
            return Ok(false);
        }

        let vertex_array = self.object.handle();
        let element_buffer = indices.handle();
        let mode = self.mode;
        context::with(|ctx| {
            ctx.driver()
                .vertex_array_element_buffer(vertex_array, element_buffer)?;
            ctx.driver().draw_elements(mode, count, 0)?;
            Ok(())
        })?;
        log::trace!("Drew {} indices from object {}", count, vertex_array);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::driver::ComponentType;
    use crate::gfx::rendering::WindowFrame;
    use crate::gfx::resources::kind::{Index, Vertex};
    use crate::gfx::resources::{fmt, Format};
    use crate::gfx::shader::pass_through;
    use crate::gfx::test_support::{capture_logs, headless, logged_errors};

    const TRIANGLE: [f32; 9] = [-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0];

    fn triangle_object() -> (Object, usize) {
        let mut object = Object::new().unwrap();
        let positions = object.emplace_buffer::<Vertex>().unwrap();
        let indices = object.emplace_buffer::<Index>().unwrap();

        let vertices = object.get_mut::<Vertex>(positions).unwrap();
        vertices.resize(TRIANGLE.len() * 4).unwrap();
        vertices.send(&TRIANGLE).unwrap();

        let elements = object.get_mut::<Index>(indices).unwrap();
        elements.resize(3 * 4).unwrap();
        elements.send(&[0u32, 1, 2]).unwrap();

        object.format(positions, fmt::three_floats(0)).unwrap();
        (object, indices)
    }

    #[test]
    fn test_renders_one_triangle() {
        capture_logs();
        let (_gfx, recorder) = headless();
        let frame = WindowFrame::new(64, 64);
        let program = pass_through("position", "texcoord", "texture_sampler").unwrap();
        assert!(program.ready());
        let (object, index_slot) = triangle_object();

        let mut device = Device::new(&frame, &program, &object);
        device.set_handle(index_slot);
        object.bind().unwrap();
        program.bind().unwrap();
        program.update().unwrap();

        assert!(device.render().unwrap());
        let draws = recorder.draw_calls();
        assert_eq!(draws.len(), 1);
        let draw = &draws[0];
        assert_eq!(draw.mode, DrawMode::Triangles);
        assert_eq!(draw.primitive_count(), 1);
        assert_eq!(draw.indices, vec![0, 1, 2]);
        assert_eq!(
            draw.attribute(0).unwrap(),
            &[
                vec![-1.0f32, -1.0, 0.0],
                vec![1.0f32, -1.0, 0.0],
                vec![0.0f32, 1.0, 0.0]
            ]
        );
        assert!(logged_errors().is_empty(), "{:?}", logged_errors());
    }

    #[test]
    fn test_reformat_to_fewer_attributes_still_draws() {
        let (_gfx, recorder) = headless();
        let frame = WindowFrame::new(64, 64);
        let program = pass_through("position", "texcoord", "texture_sampler").unwrap();
        let (mut object, index_slot) = triangle_object();
        let pos_uv = Format::new("pos_uv")
            .attribute(0, 3, ComponentType::Float)
            .attribute(1, 2, ComponentType::Float);
        object.format(0, pos_uv).unwrap();
        object.format(0, fmt::three_floats(0)).unwrap();
        assert_eq!(object.format_of(0).unwrap().indices().collect::<Vec<_>>(), vec![0]);

        let mut device = Device::new(&frame, &program, &object);
        device.set_handle(index_slot);
        object.bind().unwrap();
        program.bind().unwrap();

        assert!(device.render().unwrap());
        let draws = recorder.draw_calls();
        assert!(draws[0].attribute(1).is_none());
        assert_eq!(draws[0].attribute(0).unwrap().len(), 3);
    }

    #[test]
    fn test_unbound_object_is_skipped() {
        let (_gfx, recorder) = headless();
        let frame = WindowFrame::new(64, 64);
        let program = pass_through("position", "texcoord", "texture_sampler").unwrap();
        let (object, index_slot) = triangle_object();

        let mut device = Device::new(&frame, &program, &object);
        device.set_handle(index_slot);
        program.bind().unwrap();
        assert!(!device.render().unwrap());
        assert!(recorder.draw_calls().is_empty());
    }

    #[test]
    fn test_index_slot_must_hold_indices() {
        let (_gfx, recorder) = headless();
        let frame = WindowFrame::new(64, 64);
        let program = pass_through("position", "texcoord", "texture_sampler").unwrap();
        let (object, _) = triangle_object();
        object.bind().unwrap();
        program.bind().unwrap();

        let mut device = Device::new(&frame, &program, &object);
        assert!(!device.render().unwrap());
        device.set_handle(0);
        assert!(!device.render().unwrap());
        device.set_handle(9);
        assert!(!device.render().unwrap());
        assert!(recorder.draw_calls().is_empty());
    }

    #[test]
    fn test_set_object_retargets_the_draw() {
        let (_gfx, recorder) = headless();
        let frame = WindowFrame::new(64, 64);
        let program = pass_through("position", "texcoord", "texture_sampler").unwrap();
        let (first, index_slot) = triangle_object();
        let (second, _) = triangle_object();

        let mut device = Device::new(&frame, &program, &first);
        device.set_handle(index_slot);
        device.set_object(&second);
        second.bind().unwrap();
        program.bind().unwrap();

        device.clear().unwrap();
        assert!(device.render().unwrap());
        assert_eq!(recorder.draw_calls()[0].vertex_array, second.handle());
        assert_eq!(recorder.clears().len(), 1);
    }
}
