//! Logger setup
//!
//! The library itself only logs through the `log` facade. Applications and
//! demos call [`init_logging`] once to route those records through
//! `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
