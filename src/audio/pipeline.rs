use super::chunker::ChunkAggregator;
use super::denoise::NoiseReducer;
use super::meter::{level_dbfs, FrameLevels};
use super::mulaw;
use super::resample::Resampler;
use crate::config::PipelineConfig;

/// Per-session audio pipeline: resample -> denoise -> mu-law -> chunk.
///
/// # Real-time contract
/// `push_frame` runs synchronously on the caller's audio context. It takes no
/// locks and does no I/O; its scratch buffers are reused across calls, so after
/// the first few frames the only allocations are the emitted chunks. The
/// caller must not run two frames concurrently and must finish the last frame
/// before dropping the pipeline.
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    config: PipelineConfig,
    resampler: Resampler,
    reducer: NoiseReducer,
    aggregator: ChunkAggregator,
    resampled: Vec<f32>,
    encoded: Vec<u8>,
    levels: FrameLevels,
}

impl StreamPipeline {
    /// Build a fresh pipeline. `config` should already be validated.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            resampler: Resampler::new(config.host_sample_rate, config.target_sample_rate),
            reducer: NoiseReducer::from_config(&config),
            aggregator: ChunkAggregator::new(config.bytes_per_chunk()),
            resampled: Vec::new(),
            encoded: Vec::new(),
            levels: FrameLevels::SILENT,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reducer(&self) -> &NoiseReducer {
        &self.reducer
    }

    /// Levels of the last non-empty frame before and after the gate.
    pub fn last_levels(&self) -> FrameLevels {
        self.levels
    }

    pub fn pending_bytes(&self) -> usize {
        self.aggregator.pending_len()
    }

    /// Process one host frame and return the chunks it completes.
    /// An empty frame is a no-op.
    pub fn push_frame(&mut self, frame: &[f32]) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        self.push_frame_with(frame, |chunk| chunks.push(chunk));
        chunks
    }

    /// Like [`StreamPipeline::push_frame`] but hands chunks to `emit` as they
    /// complete. Returns the number of target-rate samples produced.
    pub fn push_frame_with<F>(&mut self, frame: &[f32], emit: F) -> usize
    where
        F: FnMut(Vec<u8>),
    {
        if frame.is_empty() {
            return 0;
        }
        self.levels.input_db = level_dbfs(frame);
        self.resampled.clear();
        self.resampler.resample_into(frame, &mut self.resampled);
        if self.resampled.is_empty() {
            return 0;
        }

        self.reducer.denoise_in_place(&mut self.resampled);
        self.levels.output_db = level_dbfs(&self.resampled);

        self.encoded.clear();
        mulaw::encode_into(&self.resampled, &mut self.encoded);
        self.aggregator.aggregate_with(&self.encoded, emit);
        self.resampled.len()
    }

    /// Emit the partial remainder as a final short chunk.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.aggregator.flush()
    }

    /// Drop all carried state and start over as if newly created.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
