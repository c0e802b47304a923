//! Shared fixtures for unit tests

use super::config::ContextConfig;
use super::context::{initialise, GraphicsContext};
use super::driver::{HeadlessDriver, Recorder};

pub(crate) const VERTEX: &str = "#version 330 core
in vec3 position;
uniform mat4 a;
uniform vec3 b;
uniform int c;
void main() {
    gl_Position = a * vec4(position + b, float(c));
}
";

pub(crate) const FRAGMENT: &str = "#version 330 core
out vec4 colour;
uniform sampler2D checkerboard;
uniform bool has_normal_map;
uniform sampler2D normal_map;
uniform bool has_parallax_map;
uniform sampler2D parallax_map;
uniform float parallax_multiplier;
uniform float parallax_bias;
uniform bool has_displacement_map;
uniform sampler2D displacement_map;
uniform float displacement_factor;
uniform samplerCube cube_map_sampler;
void main() {
    colour = texture(checkerboard, vec2(0.5));
}
";

/// Installs a fresh headless context on the calling test thread.
pub(crate) fn headless() -> (GraphicsContext, Recorder) {
    let driver = HeadlessDriver::new();
    let recorder = driver.recorder();
    let gfx = initialise(driver, ContextConfig::default()).unwrap();
    (gfx, recorder)
}

/// Collects warnings and errors logged on each test thread.
struct CaptureLogger;

thread_local! {
    static CAPTURED: std::cell::RefCell<Vec<(log::Level, String)>> =
        const { std::cell::RefCell::new(Vec::new()) };
}

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            CAPTURED.with(|captured| {
                captured
                    .borrow_mut()
                    .push((record.level(), record.args().to_string()))
            });
        }
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;
static CAPTURE_INIT: std::sync::Once = std::sync::Once::new();

/// Installs the capturing logger (once per test binary) and clears this
/// thread's captured records.
pub(crate) fn capture_logs() {
    CAPTURE_INIT.call_once(|| {
        if log::set_logger(&CAPTURE_LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Warn);
        }
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Error-level messages logged on this thread since `capture_logs`.
pub(crate) fn logged_errors() -> Vec<String> {
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

/// Warning-level messages logged on this thread since `capture_logs`.
pub(crate) fn logged_warnings() -> Vec<String> {
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(level, _)| *level == log::Level::Warn)
            .map(|(_, message)| message.clone())
            .collect()
    })
}
