//! Process-wide `tracing` setup shared by the solwatch binaries.

mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
