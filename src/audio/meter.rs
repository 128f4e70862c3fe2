//! Frame levels on both sides of the noise gate.
//!
//! The pipeline measures each host frame before resampling and the same
//! audio after denoising. The difference is how much the gate took out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Reported for silence and before any frame has been measured.
pub const SILENCE_DB: f32 = -120.0;

/// Input and output level of the most recent frame, in dBFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLevels {
    pub input_db: f32,
    pub output_db: f32,
}

impl FrameLevels {
    pub const SILENT: FrameLevels = FrameLevels {
        input_db: SILENCE_DB,
        output_db: SILENCE_DB,
    };

    /// Attenuation applied by the gate. Never negative.
    pub fn reduction_db(&self) -> f32 {
        (self.input_db - self.output_db).max(0.0)
    }
}

impl Default for FrameLevels {
    fn default() -> Self {
        Self::SILENT
    }
}

/// Gate levels published from the audio context for observers on other threads.
#[derive(Clone, Debug)]
pub struct GateMeter {
    input_bits: Arc<AtomicU32>,
    output_bits: Arc<AtomicU32>,
}

impl GateMeter {
    pub fn new() -> Self {
        Self {
            input_bits: Arc::new(AtomicU32::new(SILENCE_DB.to_bits())),
            output_bits: Arc::new(AtomicU32::new(SILENCE_DB.to_bits())),
        }
    }

    pub fn publish(&self, levels: FrameLevels) {
        self.input_bits.store(levels.input_db.to_bits(), Ordering::Relaxed);
        self.output_bits.store(levels.output_db.to_bits(), Ordering::Relaxed);
    }

    pub fn levels(&self) -> FrameLevels {
        FrameLevels {
            input_db: f32::from_bits(self.input_bits.load(Ordering::Relaxed)),
            output_db: f32::from_bits(self.output_bits.load(Ordering::Relaxed)),
        }
    }

    pub fn clear(&self) {
        self.publish(FrameLevels::SILENT);
    }
}

impl Default for GateMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS of `samples` in dBFS, floored at [`SILENCE_DB`].
pub(crate) fn level_dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DB;
    }
    let energy = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    (10.0 * energy.max(1e-12).log10()).max(SILENCE_DB)
}
