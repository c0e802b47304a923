//! Draws one textured triangle on the headless driver and logs what the
//! driver recorded.
//!
//! Run with `RUST_LOG=debug` to see resource creation and release.

use topaz::gfx::{self, ContextConfig, HeadlessDriver};
use topaz::prelude::*;

const POSITIONS: [f32; 9] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0];
const TEXCOORDS: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let driver = HeadlessDriver::new();
    let recorder = driver.recorder();
    let _gfx = gfx::initialise(driver, ContextConfig::default())?;

    let mut object = Object::new()?;
    let positions = object.emplace_buffer::<kind::Vertex>()?;
    let texcoords = object.emplace_buffer::<kind::Vertex>()?;
    let indices = object.emplace_buffer::<kind::Index>()?;

    {
        let buffer = object.get_mut::<kind::Vertex>(positions)?;
        buffer.resize(std::mem::size_of_val(&POSITIONS))?;
        buffer.send(&POSITIONS)?;
    }
    {
        let buffer = object.get_mut::<kind::Vertex>(texcoords)?;
        buffer.resize(std::mem::size_of_val(&TEXCOORDS))?;
        let mut view = buffer.map::<f32>()?;
        view.copy_from_slice(&TEXCOORDS)?;
    }
    {
        let buffer = object.get_mut::<kind::Index>(indices)?;
        buffer.resize(3 * std::mem::size_of::<u32>())?;
        buffer.send(&[0u32, 1, 2])?;
    }
    object.format(positions, fmt::three_floats(0))?;
    object.format(texcoords, fmt::two_floats(1))?;

    let mut program = pass_through("position", "texcoord", "albedo")?;
    if !program.ready() {
        anyhow::bail!("pass-through program failed to build");
    }
    let albedo = Texture::from_image(
        Image::checkerboard(4, 4, 2, PixelRGBA8::BLACK, PixelRGBA8::WHITE),
        false,
    )?;
    albedo.bind(&mut program, 0, "albedo")?;

    let frame = WindowFrame::new(800, 600).with_clear_colour([0.1, 0.1, 0.15, 1.0]);
    let mut device = Device::new(&frame, &program, &object);
    device.set_handle(indices);

    object.bind()?;
    program.bind()?;
    program.update()?;
    device.clear()?;
    device.render()?;

    for draw in recorder.draw_calls() {
        log::info!(
            "{:?}: {} primitive(s), indices {:?}",
            draw.mode,
            draw.primitive_count(),
            draw.indices
        );
        for (index, values) in &draw.attributes {
            log::info!("  attribute {}: {:?}", index, values);
        }
    }
    Ok(())
}
