pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_HOST_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHUNK_MS: u32 = 20;
pub const DEFAULT_NOISE_PROFILE_MS: u32 = 300;
pub const DEFAULT_LOW_CUT_HZ: u32 = 300;
pub const DEFAULT_MID_CUT_HZ: u32 = 3_000;
pub const DEFAULT_REDUCTION_STRENGTH: f32 = 0.8;
pub const DEFAULT_MIN_GAIN: f32 = 0.2;
pub const DEFAULT_SIGNAL_ALPHA: f32 = 0.05;
pub const DEFAULT_NOISE_ALPHA_IDLE: f32 = 0.01;
// Frozen while a band carries speech; see `PipelineConfig::noise_alpha_speech`.
pub const DEFAULT_NOISE_ALPHA_SPEECH: f32 = 0.0;
pub const DEFAULT_SPEECH_RATIO: f32 = 1.5;
// Continuous speech in one band for this long lets its floor creep again.
pub const DEFAULT_NOISE_RECOVERY_MS: u32 = 3_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_DURATION_MS: u64 = 10_000;

pub(super) const MAX_CHUNK_MS: u32 = 1_000;
pub(super) const MAX_NOISE_PROFILE_MS: u32 = 10_000;
pub(super) const MAX_NOISE_RECOVERY_MS: u32 = 60_000;
pub(super) const MAX_CHANNEL_CAPACITY: usize = 4_096;
pub(super) const MIN_DURATION_MS: u64 = 100;
pub(super) const MAX_DURATION_MS: u64 = 3_600_000;
pub(super) const MAX_TAGS: usize = 32;
pub(super) const MAX_TAG_BYTES: usize = 256;
