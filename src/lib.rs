pub mod audio;
pub mod config;
pub mod protocol;
pub mod session;
mod telemetry;

pub use protocol::ControlMessage;
pub use session::{SessionStats, StreamSession};
pub use telemetry::{init_tracing, trace_log_path};
