//! One capture session: pipeline ownership, chunk hand-off, and stats.

use crate::audio::{ChunkDispatcher, GateMeter, StreamPipeline, SILENCE_DB};
use crate::config::PipelineConfig;
use crate::protocol::unix_millis;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_stream_id() -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{seq:04x}", unix_millis())
}

/// Counters for one session, reported when it stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub frames: u64,
    pub empty_frames: u64,
    pub host_samples: u64,
    pub target_samples: u64,
    pub chunks_emitted: u64,
    pub chunks_dropped: u64,
    pub bytes_emitted: u64,
    pub last_input_db: f32,
    pub last_output_db: f32,
}

impl SessionStats {
    fn new() -> Self {
        Self {
            last_input_db: SILENCE_DB,
            last_output_db: SILENCE_DB,
            ..Self::default()
        }
    }
}

/// Owns the pipeline for a single start/stop cycle.
///
/// Nothing carries over between sessions: each `start` builds a fresh
/// pipeline and stream id. `stop` is idempotent.
#[derive(Debug)]
pub struct StreamSession {
    stream_id: String,
    pipeline: Option<StreamPipeline>,
    dispatcher: ChunkDispatcher,
    meter: GateMeter,
    stats: SessionStats,
    flush_on_stop: bool,
}

impl StreamSession {
    pub fn start(config: PipelineConfig, dispatcher: ChunkDispatcher) -> Result<Self> {
        config
            .validate()
            .context("refusing to start stream session")?;
        let stream_id = next_stream_id();
        info!(
            stream_id = %stream_id,
            host_sample_rate = config.host_sample_rate,
            target_sample_rate = config.target_sample_rate,
            bytes_per_chunk = config.bytes_per_chunk(),
            "stream session started"
        );
        Ok(Self {
            stream_id,
            pipeline: Some(StreamPipeline::new(config)),
            dispatcher,
            stats: SessionStats::new(),
            meter: GateMeter::new(),
            flush_on_stop: false,
        })
    }

    /// Emit the trailing partial chunk on the first `stop`.
    pub fn with_flush_on_stop(mut self, flush: bool) -> Self {
        self.flush_on_stop = flush;
        self
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn is_active(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn config(&self) -> Option<&PipelineConfig> {
        self.pipeline.as_ref().map(StreamPipeline::config)
    }

    /// Shared gate levels, updated once per frame.
    pub fn meter(&self) -> GateMeter {
        self.meter.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run one host frame through the pipeline and hand off any completed
    /// chunks. Returns the number of chunks produced. No-op after `stop`.
    pub fn push_frame(&mut self, frame: &[f32]) -> usize {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return 0;
        };
        if frame.is_empty() {
            self.stats.empty_frames += 1;
            return 0;
        }

        self.stats.frames += 1;
        self.stats.host_samples += frame.len() as u64;

        let dispatcher = &mut self.dispatcher;
        let stats = &mut self.stats;
        let mut produced = 0usize;
        let target = pipeline.push_frame_with(frame, |chunk| {
            produced += 1;
            record_chunk(stats, dispatcher, chunk);
        });
        stats.target_samples += target as u64;

        let levels = pipeline.last_levels();
        stats.last_input_db = levels.input_db;
        stats.last_output_db = levels.output_db;
        self.meter.publish(levels);
        produced
    }

    /// End the session. The first call optionally flushes the remainder,
    /// discards pipeline state, and returns the final stats; later calls
    /// return `None`.
    pub fn stop(&mut self) -> Option<SessionStats> {
        let mut pipeline = self.pipeline.take()?;
        let pending = pipeline.pending_bytes();
        if self.flush_on_stop {
            if let Some(chunk) = pipeline.flush() {
                record_chunk(&mut self.stats, &mut self.dispatcher, chunk);
            }
        }
        drop(pipeline);
        self.meter.clear();
        info!(
            stream_id = %self.stream_id,
            frames = self.stats.frames,
            chunks = self.stats.chunks_emitted,
            dropped = self.stats.chunks_dropped,
            discarded_bytes = if self.flush_on_stop { 0 } else { pending },
            "stream session stopped"
        );
        Some(self.stats.clone())
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn record_chunk(stats: &mut SessionStats, dispatcher: &mut ChunkDispatcher, chunk: Vec<u8>) {
    stats.chunks_emitted += 1;
    stats.bytes_emitted += chunk.len() as u64;
    if !dispatcher.dispatch(chunk) {
        stats.chunks_dropped += 1;
    }
}
