//! Command-line parsing and the session-scoped pipeline configuration.

mod defaults;
mod validation;

use clap::{ArgAction, Parser};
use serde::Serialize;
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_MS, DEFAULT_DURATION_MS, DEFAULT_HOST_SAMPLE_RATE,
    DEFAULT_LOW_CUT_HZ, DEFAULT_MID_CUT_HZ, DEFAULT_MIN_GAIN, DEFAULT_NOISE_ALPHA_IDLE,
    DEFAULT_NOISE_ALPHA_SPEECH, DEFAULT_NOISE_PROFILE_MS, DEFAULT_NOISE_RECOVERY_MS, DEFAULT_REDUCTION_STRENGTH,
    DEFAULT_SIGNAL_ALPHA, DEFAULT_SPEECH_RATIO, DEFAULT_TARGET_SAMPLE_RATE,
};

/// CLI options for the `voicelink` streamer.
#[derive(Debug, Parser, Clone)]
#[command(about = "VoiceLink: denoised mu-law microphone streaming", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Capture duration before the session stops (milliseconds)
    #[arg(long = "duration-ms", default_value_t = DEFAULT_DURATION_MS)]
    pub duration_ms: u64,

    /// Write mu-law chunks here ("-" for stdout); omitted means count only
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write stream_start/stream_end JSON lines here instead of stderr
    #[arg(long = "control-log", value_name = "PATH")]
    pub control_log: Option<PathBuf>,

    /// Session intent tag forwarded in stream_start (repeatable)
    #[arg(long = "tag", action = ArgAction::Append, value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Emit the trailing partial chunk when the session stops
    #[arg(long = "flush-on-stop", default_value_t = false)]
    pub flush_on_stop: bool,

    /// Chunk queue capacity between the audio context and the writer
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Wire sample rate (Hz)
    #[arg(long = "target-sample-rate", default_value_t = DEFAULT_TARGET_SAMPLE_RATE)]
    pub target_sample_rate: u32,

    /// Chunk duration (milliseconds)
    #[arg(long = "chunk-ms", default_value_t = DEFAULT_CHUNK_MS)]
    pub chunk_ms: u32,

    /// Initial noise profiling window (milliseconds)
    #[arg(long = "noise-profile-ms", default_value_t = DEFAULT_NOISE_PROFILE_MS)]
    pub noise_profile_ms: u32,

    /// Low/mid band crossover (Hz)
    #[arg(long = "low-cut-hz", default_value_t = DEFAULT_LOW_CUT_HZ)]
    pub low_cut_hz: u32,

    /// Mid/high band crossover (Hz)
    #[arg(long = "mid-cut-hz", default_value_t = DEFAULT_MID_CUT_HZ)]
    pub mid_cut_hz: u32,

    /// Noise reduction strength (0.0-1.0)
    #[arg(long = "reduction-strength", default_value_t = DEFAULT_REDUCTION_STRENGTH)]
    pub reduction_strength: f32,

    /// Minimum per-band gain (0.0-1.0)
    #[arg(long = "min-gain", default_value_t = DEFAULT_MIN_GAIN)]
    pub min_gain: f32,

    /// Signal power smoothing factor
    #[arg(long = "signal-alpha", default_value_t = DEFAULT_SIGNAL_ALPHA)]
    pub signal_alpha: f32,

    /// Noise floor smoothing factor while a band is quiet
    #[arg(long = "noise-alpha-idle", default_value_t = DEFAULT_NOISE_ALPHA_IDLE)]
    pub noise_alpha_idle: f32,

    /// Noise floor smoothing factor while a band carries speech
    #[arg(long = "noise-alpha-speech", default_value_t = DEFAULT_NOISE_ALPHA_SPEECH)]
    pub noise_alpha_speech: f32,

    /// Signal/noise RMS ratio above which a band counts as speech
    #[arg(long = "speech-ratio", default_value_t = DEFAULT_SPEECH_RATIO)]
    pub speech_ratio: f32,

    /// Continuous speech in a band before its noise floor may rise again
    /// (milliseconds, 0 disables)
    #[arg(long = "noise-recovery-ms", default_value_t = DEFAULT_NOISE_RECOVERY_MS)]
    pub noise_recovery_ms: u32,

    /// Enable file logging (JSON trace)
    #[arg(long = "logs", env = "VOICELINK_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs)
    #[arg(long = "no-logs", env = "VOICELINK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

/// Everything one capture session's pipeline needs. Immutable once the
/// session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub host_sample_rate: u32,
    pub target_sample_rate: u32,
    pub chunk_ms: u32,
    pub noise_profile_ms: u32,
    pub low_cut_hz: u32,
    pub mid_cut_hz: u32,
    pub reduction_strength: f32,
    pub min_gain: f32,
    pub signal_alpha: f32,
    pub noise_alpha_idle: f32,
    /// Noise-floor smoothing while a band is classified as speech. Zero keeps
    /// the floor frozen during speech so steady voiced sounds are not gated.
    pub noise_alpha_speech: f32,
    pub speech_ratio: f32,
    /// A band that stays classified as speech this long starts tracking its
    /// floor again, so a background that got louder after profiling is not
    /// passed forever. Zero disables recovery.
    pub noise_recovery_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_host_rate(DEFAULT_HOST_SAMPLE_RATE)
    }
}

impl PipelineConfig {
    /// Default tuning for a device running at `host_sample_rate`.
    pub fn with_host_rate(host_sample_rate: u32) -> Self {
        Self {
            host_sample_rate,
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            chunk_ms: DEFAULT_CHUNK_MS,
            noise_profile_ms: DEFAULT_NOISE_PROFILE_MS,
            low_cut_hz: DEFAULT_LOW_CUT_HZ,
            mid_cut_hz: DEFAULT_MID_CUT_HZ,
            reduction_strength: DEFAULT_REDUCTION_STRENGTH,
            min_gain: DEFAULT_MIN_GAIN,
            signal_alpha: DEFAULT_SIGNAL_ALPHA,
            noise_alpha_idle: DEFAULT_NOISE_ALPHA_IDLE,
            noise_alpha_speech: DEFAULT_NOISE_ALPHA_SPEECH,
            speech_ratio: DEFAULT_SPEECH_RATIO,
            noise_recovery_ms: DEFAULT_NOISE_RECOVERY_MS,
        }
    }

    /// Host samples consumed per output sample.
    pub fn resample_step(&self) -> f64 {
        f64::from(self.host_sample_rate) / f64::from(self.target_sample_rate)
    }

    /// One chunk is one `chunk_ms` slice of target-rate audio, one byte per sample.
    pub fn bytes_per_chunk(&self) -> usize {
        (f64::from(self.target_sample_rate) * f64::from(self.chunk_ms) / 1000.0).round() as usize
    }

    pub fn noise_profile_samples(&self) -> usize {
        let samples =
            (f64::from(self.target_sample_rate) * f64::from(self.noise_profile_ms) / 1000.0).round();
        (samples as usize).max(1)
    }

    /// Target-rate samples of continuous speech before floor recovery, if enabled.
    pub fn noise_recovery_samples(&self) -> Option<usize> {
        if self.noise_recovery_ms == 0 {
            return None;
        }
        let samples =
            (f64::from(self.target_sample_rate) * f64::from(self.noise_recovery_ms) / 1000.0).round();
        Some((samples as usize).max(1))
    }
}
