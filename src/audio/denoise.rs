//! Adaptive three-band spectral gate.
//!
//! Two one-pole low-pass filters split each sample into low, mid, and high
//! bands. Each band tracks an EMA of its signal power and of its noise floor;
//! the ratio of the two sets a per-band gain between `min_gain` and 1.
//!
//! The floor only moves at `noise_alpha_speech` while a band is classified as
//! speech. Once a band has been speech for `noise_recovery_ms` without a break,
//! the floor creeps at [`RECOVERY_NOISE_ALPHA`] so a louder background
//! eventually gets gated too. A steady tone held past that point is gated as well.

use crate::config::PipelineConfig;
use std::f32::consts::PI;
use tracing::{debug, warn};

const SQRT_GUARD: f32 = 1e-12;
const GAIN_EPSILON: f32 = 1e-6;
const INITIAL_SIGNAL_POWER: f32 = 1e-8;
const INITIAL_NOISE_POWER: f32 = 1e-6;
// Noise floors louder than this after profiling usually mean someone talked.
const SUSPECT_FLOOR_DB: f32 = -30.0;
/// Floor smoothing once a band has been speech for the whole recovery window.
pub const RECOVERY_NOISE_ALPHA: f32 = 0.001;

/// Frequency band produced by [`BandSplitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Low, Band::Mid, Band::High];

    pub fn label(self) -> &'static str {
        match self {
            Band::Low => "low",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }
}

/// One value per band. Used for powers, RMS levels, and gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPower {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandPower {
    pub const fn splat(value: f32) -> Self {
        Self {
            low: value,
            mid: value,
            high: value,
        }
    }

    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Low => self.low,
            Band::Mid => self.mid,
            Band::High => self.high,
        }
    }

    fn get_mut(&mut self, band: Band) -> &mut f32 {
        match band {
            Band::Low => &mut self.low,
            Band::Mid => &mut self.mid,
            Band::High => &mut self.high,
        }
    }

    /// Square root of each band's power, guarded against zero.
    pub fn rms(&self) -> BandPower {
        BandPower {
            low: (self.low + SQRT_GUARD).sqrt(),
            mid: (self.mid + SQRT_GUARD).sqrt(),
            high: (self.high + SQRT_GUARD).sqrt(),
        }
    }
}

/// Filter state for the band split. Never reset within a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSplitter {
    alpha_low: f32,
    alpha_mid: f32,
    low_state: f32,
    mid_state: f32,
}

impl BandSplitter {
    pub fn new(low_cut_hz: u32, mid_cut_hz: u32, sample_rate: u32) -> Self {
        Self {
            alpha_low: one_pole_alpha(low_cut_hz, sample_rate),
            alpha_mid: one_pole_alpha(mid_cut_hz, sample_rate),
            low_state: 0.0,
            mid_state: 0.0,
        }
    }

    /// Advance both filters by one sample and return `(low, mid, high)`.
    /// The three bands always sum back to `x`.
    pub fn split(&mut self, x: f32) -> BandPower {
        self.low_state += self.alpha_low * (x - self.low_state);
        self.mid_state += self.alpha_mid * (x - self.mid_state);
        BandPower {
            low: self.low_state,
            mid: self.mid_state - self.low_state,
            high: x - self.mid_state,
        }
    }
}

fn one_pole_alpha(cutoff_hz: u32, sample_rate: u32) -> f32 {
    1.0 - (-2.0 * PI * cutoff_hz as f32 / sample_rate.max(1) as f32).exp()
}

/// Smoothing and gating constants, fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GateParams {
    pub(crate) reduction_strength: f32,
    pub(crate) min_gain: f32,
    pub(crate) signal_alpha: f32,
    pub(crate) noise_alpha_idle: f32,
    pub(crate) noise_alpha_speech: f32,
    pub(crate) speech_ratio: f32,
    pub(crate) recovery_samples: Option<usize>,
}

impl From<&PipelineConfig> for GateParams {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            reduction_strength: cfg.reduction_strength,
            min_gain: cfg.min_gain,
            signal_alpha: cfg.signal_alpha,
            noise_alpha_idle: cfg.noise_alpha_idle,
            noise_alpha_speech: cfg.noise_alpha_speech,
            speech_ratio: cfg.speech_ratio,
            recovery_samples: cfg.noise_recovery_samples(),
        }
    }
}

/// Per-band signal and noise-floor powers plus the profiling counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    signal: BandPower,
    noise: BandPower,
    speech_run: [usize; 3],
    profiled_samples: usize,
    profile_target: usize,
}

impl NoiseProfile {
    pub fn new(profile_target: usize) -> Self {
        Self {
            signal: BandPower::splat(INITIAL_SIGNAL_POWER),
            noise: BandPower::splat(INITIAL_NOISE_POWER),
            speech_run: [0; 3],
            profiled_samples: 0,
            profile_target: profile_target.max(1),
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profiled_samples < self.profile_target
    }

    pub fn signal_power(&self) -> BandPower {
        self.signal
    }

    pub fn noise_power(&self) -> BandPower {
        self.noise
    }

    pub fn profiled_samples(&self) -> usize {
        self.profiled_samples
    }

    /// Consecutive samples `band` has been classified as speech.
    pub fn speech_run(&self, band: Band) -> usize {
        self.speech_run[band as usize]
    }

    /// Update one band with its newest value and return the gain to apply.
    fn update_band(&mut self, band: Band, value: f32, profiling: bool, params: &GateParams) -> f32 {
        let power = value * value;

        let signal = self.signal.get_mut(band);
        *signal += params.signal_alpha * (power - *signal);
        let signal_rms = (*signal + SQRT_GUARD).sqrt();

        // The gate compares against the floor as it stood before this sample.
        let noise = self.noise.get_mut(band);
        let noise_rms = (*noise + SQRT_GUARD).sqrt();
        let is_speech = signal_rms > noise_rms * params.speech_ratio;
        let run = &mut self.speech_run[band as usize];
        let alpha = if is_speech {
            *run = run.saturating_add(1);
            match params.recovery_samples {
                Some(limit) if *run >= limit => {
                    params.noise_alpha_speech.max(RECOVERY_NOISE_ALPHA)
                }
                _ => params.noise_alpha_speech,
            }
        } else {
            *run = 0;
            params.noise_alpha_idle
        };
        *noise += alpha * (power - *noise);
        if profiling {
            *noise = (*noise).max(power);
        }

        let gain = 1.0 - params.reduction_strength * (noise_rms / (signal_rms + GAIN_EPSILON));
        gain.clamp(params.min_gain, 1.0)
    }

    /// Count one profiled sample; returns true on the sample that closes the window.
    fn advance_profile(&mut self) -> bool {
        if !self.is_profiling() {
            return false;
        }
        self.profiled_samples += 1;
        !self.is_profiling()
    }
}

/// Sample-by-sample noise reduction at the target rate.
#[derive(Debug, Clone)]
pub struct NoiseReducer {
    splitter: BandSplitter,
    profile: NoiseProfile,
    params: GateParams,
}

impl NoiseReducer {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            splitter: BandSplitter::new(cfg.low_cut_hz, cfg.mid_cut_hz, cfg.target_sample_rate),
            profile: NoiseProfile::new(cfg.noise_profile_samples()),
            params: GateParams::from(cfg),
        }
    }

    pub fn profile(&self) -> &NoiseProfile {
        &self.profile
    }

    pub fn denoise(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = samples.to_vec();
        self.denoise_in_place(&mut out);
        out
    }

    pub fn denoise_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn process_sample(&mut self, x: f32) -> f32 {
        // Non-finite host samples would poison the filter state for the session.
        let x = if x.is_finite() { x } else { 0.0 };
        let bands = self.splitter.split(x);
        let profiling = self.profile.is_profiling();

        let mut y = 0.0f32;
        for band in Band::ALL {
            let value = bands.get(band);
            y += value * self.profile.update_band(band, value, profiling, &self.params);
        }

        if profiling && self.profile.advance_profile() {
            self.report_profile();
        }
        y.clamp(-1.0, 1.0)
    }

    fn report_profile(&self) {
        let floor = self.profile.noise.rms();
        debug!(
            samples = self.profile.profiled_samples,
            low_db = to_db(floor.low),
            mid_db = to_db(floor.mid),
            high_db = to_db(floor.high),
            "noise profile complete"
        );
        for band in Band::ALL {
            let db = to_db(floor.get(band));
            if db > SUSPECT_FLOOR_DB {
                warn!(
                    band = band.label(),
                    floor_db = db,
                    "profile_suspect: noise floor is loud, speech during profiling likely"
                );
                break;
            }
        }
    }
}

fn to_db(rms: f32) -> f32 {
    20.0 * rms.max(1e-9).log10()
}
