//! JSON trace output for the streamer.
//!
//! Tracing stays off unless `--logs` is given; `--no-logs` always wins. Events
//! go to `VOICELINK_TRACE_LOG` or a file in the temp dir, never the terminal,
//! because stdout may be carrying audio bytes.

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

const TRACE_LOG_ENV: &str = "VOICELINK_TRACE_LOG";
const TRACE_LOG_FILE: &str = "voicelink_trace.jsonl";

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

pub fn trace_log_path() -> PathBuf {
    env::var_os(TRACE_LOG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join(TRACE_LOG_FILE))
}

fn tracing_enabled(config: &AppConfig) -> bool {
    config.logs && !config.no_logs
}

/// Install the global JSON subscriber once per process.
///
/// Returns the trace file path when logging is active. A file that cannot be
/// opened leaves logging off rather than failing the session.
pub fn init_tracing(config: &AppConfig) -> Option<PathBuf> {
    if !tracing_enabled(config) {
        return None;
    }

    TRACING_INIT
        .get_or_init(|| {
            let path = trace_log_path();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()?;
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_max_level(Level::DEBUG)
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok()?;
            Some(path)
        })
        .clone()
}
