use std::cmp::Ordering as CmpOrdering;

// Practical bounds on host rates; anything outside is a misconfigured device.
pub(crate) const MIN_DEVICE_RATE: u32 = 2_000;
pub(crate) const MAX_DEVICE_RATE: u32 = 1_600_000;

/// Streaming linear-interpolation resampler.
///
/// Host frames are appended to a retained tail. Output samples are read at a
/// fractional cursor that advances by `step = host_rate / target_rate`, so any
/// positive ratio works, including non-integer ones such as 44.1 kHz -> 16 kHz.
/// Whole samples behind the cursor are compacted away after every pass, which
/// keeps the tail at most one step plus the latest frame long.
///
/// Invariant after each call: either the tail is non-empty and the cursor is
/// below 1, or the tail is empty and the cursor holds a pending skip below
/// `step` (the cursor overshot the tail, which happens when `step > 2`).
#[derive(Debug, Clone)]
pub struct Resampler {
    step: f64,
    cursor: f64,
    tail: Vec<f32>,
}

impl Resampler {
    /// Build a resampler for `host_rate` -> `target_rate`. Both rates must be
    /// non-zero; `PipelineConfig::validate` enforces that before a session starts.
    pub fn new(host_rate: u32, target_rate: u32) -> Self {
        Self::with_step(f64::from(host_rate) / f64::from(target_rate.max(1)))
    }

    pub(crate) fn with_step(step: f64) -> Self {
        Self {
            step,
            cursor: 0.0,
            tail: Vec::new(),
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Resample one host frame, returning the target-rate samples it completes.
    pub fn resample(&mut self, new_samples: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.expected_len(new_samples.len()));
        self.resample_into(new_samples, &mut out);
        out
    }

    /// Same as [`Resampler::resample`] but appends into a caller-owned buffer so
    /// the per-frame path can reuse its allocation.
    pub fn resample_into(&mut self, new_samples: &[f32], out: &mut Vec<f32>) {
        // A non-positive step would never advance the cursor.
        if new_samples.is_empty() || !(self.step > 0.0) {
            return;
        }
        self.tail.extend_from_slice(new_samples);

        let len = self.tail.len();
        while self.cursor + 1.0 < len as f64 {
            let idx = self.cursor.floor();
            let frac = (self.cursor - idx) as f32;
            let i0 = idx as usize;
            let s0 = self.tail[i0];
            let s1 = self.tail[i0 + 1];
            out.push(s0 + (s1 - s0) * frac);
            self.cursor += self.step;
        }

        self.compact();
    }

    /// Number of host samples retained for the next call.
    pub fn pending_len(&self) -> usize {
        self.tail.len()
    }

    /// Fractional read position inside the retained tail.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0.0;
        self.tail.clear();
    }

    fn expected_len(&self, input_len: usize) -> usize {
        if self.step <= 0.0 {
            return 0;
        }
        ((self.tail.len() + input_len) as f64 / self.step).ceil() as usize + 1
    }

    fn compact(&mut self) {
        let whole = self.cursor.floor() as usize;
        if whole == 0 {
            return;
        }
        let len = self.tail.len();
        match whole.cmp(&len) {
            CmpOrdering::Less => {
                self.tail.copy_within(whole.., 0);
                self.tail.truncate(len - whole);
                self.cursor -= whole as f64;
            }
            // Overshoot: the cursor sits past the end of the tail. Keep the
            // remaining skip so the next frame starts at the right position.
            CmpOrdering::Equal | CmpOrdering::Greater => {
                self.tail.clear();
                self.cursor -= len as f64;
            }
        }
    }
}
