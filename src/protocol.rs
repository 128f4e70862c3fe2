//! Control messages that bracket a mu-law stream.
//!
//! Sent as newline-delimited JSON on the control channel, separate from the
//! binary chunks. Encoding and rate always come from the pipeline that
//! produces the bytes.

use crate::audio::{TARGET_CHANNELS, WIRE_ENCODING};
use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Serialized with a `"type"` tag field for type discrimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Announces the wire format before the first chunk
    #[serde(rename = "stream_start")]
    StreamStart {
        stream_id: String,
        encoding: String,
        sample_rate: u32,
        channels: u32,
        /// Unix milliseconds
        timestamp: u64,
        /// Session intent tags, flattened into the top-level object
        #[serde(flatten)]
        tags: BTreeMap<String, String>,
    },

    /// Sent after the last chunk
    #[serde(rename = "stream_end")]
    StreamEnd { stream_id: String, timestamp: u64 },
}

impl ControlMessage {
    pub fn stream_start(
        config: &PipelineConfig,
        stream_id: &str,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self::StreamStart {
            stream_id: stream_id.to_string(),
            encoding: WIRE_ENCODING.to_string(),
            sample_rate: config.target_sample_rate,
            channels: TARGET_CHANNELS,
            timestamp: unix_millis(),
            tags,
        }
    }

    pub fn stream_end(stream_id: &str) -> Self {
        Self::StreamEnd {
            stream_id: stream_id.to_string(),
            timestamp: unix_millis(),
        }
    }

    pub fn stream_id(&self) -> &str {
        match self {
            Self::StreamStart { stream_id, .. } | Self::StreamEnd { stream_id, .. } => stream_id,
        }
    }

    /// One JSON line without the trailing newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
