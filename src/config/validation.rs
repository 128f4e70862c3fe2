use super::defaults::{
    MAX_CHANNEL_CAPACITY, MAX_CHUNK_MS, MAX_DURATION_MS, MAX_NOISE_PROFILE_MS,
    MAX_NOISE_RECOVERY_MS, MAX_TAGS, MAX_TAG_BYTES, MIN_DURATION_MS,
};
use super::{AppConfig, PipelineConfig};
use crate::audio::{MAX_DEVICE_RATE, MIN_DEVICE_RATE};
use anyhow::{bail, Result};
use clap::Parser;
use std::collections::BTreeMap;
use tracing::warn;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values that do not depend on the capture device.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&self.duration_ms) {
            bail!(
                "--duration-ms must be between {MIN_DURATION_MS} and {MAX_DURATION_MS}, got {}",
                self.duration_ms
            );
        }
        if !(1..=MAX_CHANNEL_CAPACITY).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 1 and {MAX_CHANNEL_CAPACITY}, got {}",
                self.channel_capacity
            );
        }
        if let Some(name) = &self.input_device {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                bail!("--input-device must not be empty");
            }
            self.input_device = Some(trimmed.to_string());
        }
        self.session_tags()?;

        // Host-independent pipeline checks run against the target rate so bad
        // tuning is reported before a device is opened.
        self.pipeline_config(self.target_sample_rate)?;
        Ok(())
    }

    /// Build and validate the session pipeline for a device running at `host_rate`.
    pub fn pipeline_config(&self, host_rate: u32) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            host_sample_rate: host_rate,
            target_sample_rate: self.target_sample_rate,
            chunk_ms: self.chunk_ms,
            noise_profile_ms: self.noise_profile_ms,
            low_cut_hz: self.low_cut_hz,
            mid_cut_hz: self.mid_cut_hz,
            reduction_strength: self.reduction_strength,
            min_gain: self.min_gain,
            signal_alpha: self.signal_alpha,
            noise_alpha_idle: self.noise_alpha_idle,
            noise_alpha_speech: self.noise_alpha_speech,
            speech_ratio: self.speech_ratio,
            noise_recovery_ms: self.noise_recovery_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse `--tag KEY=VALUE` pairs. Later duplicates win.
    pub fn session_tags(&self) -> Result<BTreeMap<String, String>> {
        if self.tags.len() > MAX_TAGS {
            bail!("--tag may be given at most {MAX_TAGS} times, got {}", self.tags.len());
        }
        let mut tags = BTreeMap::new();
        for raw in &self.tags {
            if raw.len() > MAX_TAG_BYTES {
                bail!("--tag values must be at most {MAX_TAG_BYTES} bytes");
            }
            let Some((key, value)) = raw.split_once('=') else {
                bail!("--tag must be KEY=VALUE, got '{raw}'");
            };
            let key = key.trim();
            if key.is_empty() {
                bail!("--tag key must not be empty in '{raw}'");
            }
            if !key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
            {
                bail!("--tag key '{key}' must contain only ASCII letters, digits, '_' or '-'");
            }
            if is_reserved_tag(key) {
                bail!("--tag key '{key}' is reserved by the control protocol");
            }
            tags.insert(key.to_string(), value.trim().to_string());
        }
        Ok(tags)
    }
}

/// Keys the `stream_start` message already carries at the top level.
fn is_reserved_tag(key: &str) -> bool {
    matches!(
        key,
        "type" | "stream_id" | "encoding" | "sample_rate" | "channels" | "timestamp"
    )
}

impl PipelineConfig {
    /// Reject any configuration the pipeline cannot run.
    pub fn validate(&self) -> Result<()> {
        let rates = MIN_DEVICE_RATE..=MAX_DEVICE_RATE;
        if !rates.contains(&self.host_sample_rate) {
            warn!(host_sample_rate = self.host_sample_rate, "rejecting host sample rate");
            bail!(
                "host sample rate must be between {MIN_DEVICE_RATE} and {MAX_DEVICE_RATE} Hz, got {}",
                self.host_sample_rate
            );
        }
        if !rates.contains(&self.target_sample_rate) {
            bail!(
                "--target-sample-rate must be between {MIN_DEVICE_RATE} and {MAX_DEVICE_RATE} Hz, got {}",
                self.target_sample_rate
            );
        }
        if self.target_sample_rate > self.host_sample_rate {
            warn!(
                host_sample_rate = self.host_sample_rate,
                target_sample_rate = self.target_sample_rate,
                "rejecting up-sampling configuration"
            );
            bail!(
                "--target-sample-rate ({}) cannot exceed the device rate ({})",
                self.target_sample_rate,
                self.host_sample_rate
            );
        }
        if !(1..=MAX_CHUNK_MS).contains(&self.chunk_ms) {
            bail!(
                "--chunk-ms must be between 1 and {MAX_CHUNK_MS}, got {}",
                self.chunk_ms
            );
        }
        if self.bytes_per_chunk() == 0 {
            bail!(
                "--chunk-ms {} is shorter than one sample at {} Hz",
                self.chunk_ms,
                self.target_sample_rate
            );
        }
        if self.noise_profile_ms > MAX_NOISE_PROFILE_MS {
            bail!(
                "--noise-profile-ms must be at most {MAX_NOISE_PROFILE_MS}, got {}",
                self.noise_profile_ms
            );
        }
        if self.noise_recovery_ms > MAX_NOISE_RECOVERY_MS {
            bail!(
                "--noise-recovery-ms must be at most {MAX_NOISE_RECOVERY_MS}, got {}",
                self.noise_recovery_ms
            );
        }
        let nyquist = self.target_sample_rate / 2;
        if self.low_cut_hz == 0 || self.low_cut_hz >= self.mid_cut_hz || self.mid_cut_hz >= nyquist
        {
            bail!(
                "band edges must satisfy 0 < --low-cut-hz ({}) < --mid-cut-hz ({}) < {nyquist} Hz",
                self.low_cut_hz,
                self.mid_cut_hz
            );
        }
        check_unit("--reduction-strength", self.reduction_strength)?;
        check_unit("--min-gain", self.min_gain)?;
        check_unit("--signal-alpha", self.signal_alpha)?;
        check_unit("--noise-alpha-idle", self.noise_alpha_idle)?;
        check_unit("--noise-alpha-speech", self.noise_alpha_speech)?;
        if !self.speech_ratio.is_finite() || self.speech_ratio < 1.0 {
            bail!("--speech-ratio must be at least 1.0, got {}", self.speech_ratio);
        }
        Ok(())
    }
}

fn check_unit(flag: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{flag} must be between 0.0 and 1.0, got {value}");
    }
    Ok(())
}
