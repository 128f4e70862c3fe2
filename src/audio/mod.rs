//! Microphone-to-wire audio pipeline.
//!
//! Host frames arrive at the device's native rate, get resampled to the target
//! rate, run through a three-band noise gate, are companded to G.711 mu-law,
//! and leave as fixed-size byte chunks for the transport.

/// Default wire sample rate.
pub const TARGET_RATE: u32 = 16_000;

/// Wire channel count. The pipeline is mono end to end.
pub const TARGET_CHANNELS: u32 = 1;

/// Encoding name announced in `stream_start`.
pub const WIRE_ENCODING: &str = "mulaw";

mod capture;
mod chunker;
mod denoise;
mod dispatch;
mod meter;
pub mod mulaw;
mod pipeline;
mod recorder;
mod resample;
#[cfg(test)]
mod tests;

pub use capture::{CaptureDevice, FrameStream, SyntheticCapture};
pub use chunker::ChunkAggregator;
pub use denoise::{
    Band, BandPower, BandSplitter, NoiseProfile, NoiseReducer, RECOVERY_NOISE_ALPHA,
};
pub use dispatch::{append_downmixed_samples, ChunkDispatcher};
pub use meter::{FrameLevels, GateMeter, SILENCE_DB};
pub use pipeline::StreamPipeline;
pub use recorder::Recorder;
pub use resample::Resampler;
pub(crate) use resample::{MAX_DEVICE_RATE, MIN_DEVICE_RATE};
