use super::capture::{CaptureDevice, SyntheticCapture};
use super::chunker::ChunkAggregator;
use super::denoise::{Band, BandSplitter, NoiseReducer};
use super::dispatch::{append_downmixed_samples, ChunkDispatcher};
use super::meter::FrameLevels;
use super::mulaw::{decode, encode, linear_to_mulaw, mulaw_to_linear, quantize_i16};
use super::pipeline::StreamPipeline;
use super::resample::Resampler;
use super::TARGET_RATE;
use crate::config::PipelineConfig;
use std::f32::consts::PI;

/// Deterministic xorshift64 noise in [-1, 1).
struct XorShift(u64);

impl XorShift {
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn uniform(&mut self) -> f32 {
        ((self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
    }
}

fn sine(rate: u32, freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| amplitude * (2.0 * PI * freq * n as f32 / rate as f32).sin())
        .collect()
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32).sqrt()
}

fn reducer_at_target() -> NoiseReducer {
    NoiseReducer::from_config(&PipelineConfig::with_host_rate(TARGET_RATE))
}

// ---------------------------------------------------------------------------
// Downmix and dispatch
// ---------------------------------------------------------------------------

#[test]
fn downmixes_multi_channel_audio() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn preserves_single_channel_audio() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn downmix_averages_trailing_partial_frame() {
    let mut buf = Vec::new();
    let samples = [0.3f32, 0.3, 0.3, 0.6];
    append_downmixed_samples(&mut buf, &samples, 3, |sample| sample);
    assert_eq!(buf.len(), 2);
    assert!((buf[0] - 0.3).abs() < 1e-6);
    assert!((buf[1] - 0.6).abs() < 1e-6);
}

#[test]
fn downmix_applies_sample_conversion() {
    let mut buf = Vec::new();
    let samples = [i16::MAX, i16::MAX];
    append_downmixed_samples(&mut buf, &samples, 2, |s| s as f32 / 32_768.0);
    assert_eq!(buf.len(), 1);
    assert!(buf[0] > 0.99);
}

#[test]
fn dispatcher_counts_drops_when_full() {
    let (mut dispatcher, rx) = ChunkDispatcher::channel(2);
    assert!(dispatcher.dispatch(vec![1]));
    assert!(dispatcher.dispatch(vec![2]));
    assert!(!dispatcher.dispatch(vec![3]));
    assert!(!dispatcher.dispatch(vec![4]));
    assert_eq!(dispatcher.sent(), 2);
    assert_eq!(dispatcher.dropped(), 2);
    assert!(!dispatcher.is_closed());
    let received: Vec<Vec<u8>> = rx.try_iter().collect();
    assert_eq!(received, vec![vec![1], vec![2]]);
}

#[test]
fn dispatcher_closes_when_receiver_drops() {
    let (mut dispatcher, rx) = ChunkDispatcher::channel(2);
    drop(rx);
    assert!(!dispatcher.dispatch(vec![1]));
    assert!(dispatcher.is_closed());
    assert!(!dispatcher.dispatch(vec![2]));
    assert_eq!(dispatcher.dropped(), 0);
}

#[test]
fn dropped_counter_is_shared() {
    let (mut dispatcher, _rx) = ChunkDispatcher::channel(1);
    let counter = dispatcher.dropped_counter();
    dispatcher.dispatch(vec![0]);
    dispatcher.dispatch(vec![0]);
    assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 1);
}

// ---------------------------------------------------------------------------
// Resampler
// ---------------------------------------------------------------------------

fn run_resampler(host: u32, target: u32, frame_len: usize, total: usize) -> (usize, Resampler) {
    let mut resampler = Resampler::new(host, target);
    let input: Vec<f32> = (0..total).map(|n| (n as f32 * 0.01).sin()).collect();
    let mut produced = 0;
    for frame in input.chunks(frame_len) {
        produced += resampler.resample(frame).len();
        let cursor = resampler.cursor();
        if resampler.pending_len() > 0 {
            assert!(cursor < 1.0, "cursor {cursor} left behind a non-empty tail");
        } else {
            assert!(cursor < resampler.step(), "pending skip {cursor} exceeds step");
        }
        assert!(cursor >= 0.0);
    }
    (produced, resampler)
}

#[test]
fn resampler_output_count_tracks_ratio() {
    let cases = [
        (48_000, 16_000, 128),
        (44_100, 16_000, 441),
        (96_000, 16_000, 100),
        (16_000, 16_000, 160),
        (22_050, 16_000, 64),
        (48_000, 8_000, 5),
        (120_000, 16_000, 3),
    ];
    for (host, target, frame_len) in cases {
        let total = host as usize;
        let (produced, _) = run_resampler(host, target, frame_len, total);
        let expected = total as f64 * f64::from(target) / f64::from(host);
        assert!(
            (produced as f64 - expected).abs() <= 1.0,
            "{host}->{target} frame {frame_len}: produced {produced}, expected {expected}"
        );
    }
}

#[test]
fn resampler_tail_stays_bounded() {
    let (_, resampler) = run_resampler(44_100, 16_000, 512, 44_100);
    assert!(resampler.pending_len() <= 3);
}

#[test]
fn resampler_carries_overshoot_between_frames() {
    // step 4 with 3-sample frames: the cursor regularly lands past the tail.
    let mut resampler = Resampler::new(64_000, 16_000);
    let ramp: Vec<f32> = (0..120).map(|n| n as f32).collect();
    let mut out = Vec::new();
    for frame in ramp.chunks(3) {
        resampler.resample_into(frame, &mut out);
    }
    let expected: Vec<f32> = (0..30).map(|k| (4 * k) as f32).collect();
    assert_eq!(out, expected);
}

#[test]
fn resampler_interpolates_fractional_positions() {
    let mut resampler = Resampler::new(24_000, 16_000);
    let ramp: Vec<f32> = (0..10).map(|n| n as f32).collect();
    let out = resampler.resample(&ramp);
    let expected = [0.0, 1.5, 3.0, 4.5, 6.0, 7.5];
    assert_eq!(out.len(), expected.len());
    for (got, want) in out.iter().zip(expected) {
        assert!((got - want).abs() < 1e-5, "{got} vs {want}");
    }
}

#[test]
fn resampler_is_seamless_across_frame_boundaries() {
    let input: Vec<f32> = (0..2_000).map(|n| (n as f32 * 0.013).sin()).collect();
    let mut whole = Resampler::new(44_100, 16_000);
    let expected = whole.resample(&input);

    let mut split = Resampler::new(44_100, 16_000);
    let mut got = Vec::new();
    for frame in input.chunks(37) {
        split.resample_into(frame, &mut got);
    }
    assert_eq!(got.len(), expected.len());
    for (a, b) in got.iter().zip(&expected) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn resampler_ignores_empty_frames() {
    let mut resampler = Resampler::new(48_000, 16_000);
    resampler.resample(&[0.1, 0.2, 0.3, 0.4]);
    let pending = resampler.pending_len();
    let cursor = resampler.cursor();
    assert!(resampler.resample(&[]).is_empty());
    assert_eq!(resampler.pending_len(), pending);
    assert_eq!(resampler.cursor(), cursor);
}

#[test]
fn resampler_reset_clears_state() {
    let mut resampler = Resampler::new(48_000, 16_000);
    resampler.resample(&[0.5; 10]);
    resampler.reset();
    assert_eq!(resampler.pending_len(), 0);
    assert_eq!(resampler.cursor(), 0.0);
}

#[test]
fn resampler_rejects_degenerate_step() {
    let mut resampler = Resampler::with_step(0.0);
    assert!(resampler.resample(&[0.1, 0.2]).is_empty());
}

// ---------------------------------------------------------------------------
// Noise reduction
// ---------------------------------------------------------------------------

#[test]
fn band_split_sums_back_to_input() {
    let mut splitter = BandSplitter::new(300, 3_000, TARGET_RATE);
    let mut rng = XorShift(42);
    for _ in 0..1_000 {
        let x = rng.uniform();
        let bands = splitter.split(x);
        let sum: f32 = Band::ALL.iter().map(|&band| bands.get(band)).sum();
        assert!((sum - x).abs() < 1e-5);
    }
}

#[test]
fn profiling_window_closes_after_configured_samples() {
    let mut reducer = reducer_at_target();
    let target = PipelineConfig::default().noise_profile_samples();
    assert!(reducer.profile().is_profiling());
    reducer.denoise(&vec![0.0; target - 1]);
    assert!(reducer.profile().is_profiling());
    reducer.process_sample(0.0);
    assert!(!reducer.profile().is_profiling());
    assert_eq!(reducer.profile().profiled_samples(), target);
    reducer.process_sample(0.0);
    assert_eq!(reducer.profile().profiled_samples(), target);
}

#[test]
fn profiling_seeds_noise_floor_from_input() {
    let mut reducer = reducer_at_target();
    let mut rng = XorShift(11);
    let noise: Vec<f32> = (0..4_800).map(|_| 0.05 * rng.uniform()).collect();
    reducer.denoise(&noise);
    let floor = reducer.profile().noise_power();
    for band in Band::ALL {
        assert!(floor.get(band) > 1e-7, "{} floor not seeded", band.label());
    }
}

#[test]
fn stationary_noise_is_attenuated() {
    let mut reducer = reducer_at_target();
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    let noise: Vec<f32> = (0..20_800).map(|_| 0.05 * rng.uniform()).collect();
    let out = reducer.denoise(&noise);
    let ratio = rms(&out[4_800..]) / rms(&noise[4_800..]);
    assert!(ratio < 0.35, "noise passed with ratio {ratio}");

    let silence = reducer.denoise(&vec![0.0; 8_000]);
    assert!(rms(&silence[4_000..]) < 1e-3);
}

#[test]
fn steady_tone_after_quiet_profile_passes() {
    let mut reducer = reducer_at_target();
    let mut rng = XorShift(0x2545_F491_4F6C_DD1D);
    let quiet: Vec<f32> = (0..4_800).map(|_| 0.001 * rng.uniform()).collect();
    reducer.denoise(&quiet);

    let tone = sine(TARGET_RATE, 1_000.0, 0.5, 16_000);
    let out = reducer.denoise(&tone);
    let ratio = rms(&out[8_000..]) / rms(&tone[8_000..]);
    assert!(ratio > 0.95, "tone gated to ratio {ratio}");
}

/// Quiet profiling window, then a background 50x louder for six seconds.
/// Returns the output/input RMS ratio during second two and during the last half second.
fn louder_background_ratios(config: PipelineConfig) -> (f32, f32) {
    let mut reducer = NoiseReducer::from_config(&config);
    let mut rng = XorShift(0x1234_5678_9ABC_DEF1);
    let quiet: Vec<f32> = (0..4_800).map(|_| 0.001 * rng.uniform()).collect();
    reducer.denoise(&quiet);

    let fan: Vec<f32> = (0..96_000).map(|_| 0.05 * rng.uniform()).collect();
    let out = reducer.denoise(&fan);
    let early = rms(&out[16_000..24_000]) / rms(&fan[16_000..24_000]);
    let late = rms(&out[88_000..]) / rms(&fan[88_000..]);
    (early, late)
}

#[test]
fn frozen_floor_without_recovery_passes_louder_background() {
    let config = PipelineConfig {
        noise_alpha_speech: 0.0,
        noise_recovery_ms: 0,
        ..PipelineConfig::with_host_rate(TARGET_RATE)
    };
    let (early, late) = louder_background_ratios(config);
    assert!(early > 0.9, "early ratio {early}");
    assert!(late > 0.9, "late ratio {late}");
}

#[test]
fn slow_speech_alpha_tracks_louder_background() {
    let config = PipelineConfig {
        noise_alpha_speech: 0.001,
        noise_recovery_ms: 0,
        ..PipelineConfig::with_host_rate(TARGET_RATE)
    };
    let (_, late) = louder_background_ratios(config);
    assert!(late < 0.35, "late ratio {late}");
}

#[test]
fn default_floor_recovers_after_sustained_speech() {
    let (early, late) = louder_background_ratios(PipelineConfig::with_host_rate(TARGET_RATE));
    // Inside the recovery window the floor is frozen.
    assert!(early > 0.9, "early ratio {early}");
    assert!(late < 0.35, "late ratio {late}");
}

#[test]
fn steady_tone_holds_for_the_recovery_window() {
    let mut reducer = reducer_at_target();
    reducer.denoise(&vec![0.0; 4_800]);

    let tone = sine(TARGET_RATE, 1_000.0, 0.5, 80_000);
    let mut out = reducer.denoise(&tone[..16_000]);
    assert!(reducer.profile().speech_run(Band::Mid) > 8_000);
    out.extend(reducer.denoise(&tone[16_000..]));
    let held = rms(&out[8_000..40_000]) / rms(&tone[8_000..40_000]);
    assert!(held > 0.95, "tone gated early to ratio {held}");
    let recovered = rms(&out[64_000..]) / rms(&tone[64_000..]);
    assert!(recovered < 0.5, "floor never caught up, ratio {recovered}");

    reducer.denoise(&vec![0.0; 1_600]);
    assert_eq!(reducer.profile().speech_run(Band::Mid), 0);
}

#[test]
fn speech_in_noise_survives() {
    let mut reducer = reducer_at_target();
    let mut rng = XorShift(7);
    let noise: Vec<f32> = (0..4_800).map(|_| 0.05 * rng.uniform()).collect();
    reducer.denoise(&noise);
    let mixed: Vec<f32> = sine(TARGET_RATE, 440.0, 0.5, 16_000)
        .into_iter()
        .map(|s| s + 0.05 * rng.uniform())
        .collect();
    let out = reducer.denoise(&mixed);
    let ratio = rms(&out[8_000..]) / rms(&mixed[8_000..]);
    assert!(ratio > 0.8, "speech attenuated to ratio {ratio}");
}

#[test]
fn denoiser_output_is_bounded_and_finite() {
    let mut reducer = reducer_at_target();
    let inputs = [f32::NAN, f32::INFINITY, -4.0, 4.0, 0.9, -0.9];
    for _ in 0..2_000 {
        for x in inputs {
            let y = reducer.process_sample(x);
            assert!(y.is_finite());
            assert!((-1.0..=1.0).contains(&y));
        }
    }
}

#[test]
fn denoise_in_place_matches_denoise() {
    let input = sine(TARGET_RATE, 300.0, 0.3, 1_000);
    let mut a = reducer_at_target();
    let mut b = reducer_at_target();
    let expected = a.denoise(&input);
    let mut buf = input.clone();
    b.denoise_in_place(&mut buf);
    assert_eq!(buf, expected);
}

// ---------------------------------------------------------------------------
// Mu-law
// ---------------------------------------------------------------------------

#[test]
fn quantize_clamps_and_scales() {
    assert_eq!(quantize_i16(0.0), 0);
    assert_eq!(quantize_i16(1.0), i16::MAX);
    assert_eq!(quantize_i16(-1.0), i16::MIN);
    assert_eq!(quantize_i16(3.0), i16::MAX);
    assert_eq!(quantize_i16(-3.0), i16::MIN);
    assert_eq!(quantize_i16(f32::NAN), 0);
    assert_eq!(quantize_i16(0.5), 16_384);
}

#[test]
fn mulaw_known_codes() {
    assert_eq!(linear_to_mulaw(0), 0xFF);
    assert_eq!(linear_to_mulaw(-1), 0x7F);
    assert_eq!(linear_to_mulaw(i16::MAX), 0x80);
    assert_eq!(linear_to_mulaw(i16::MIN), 0x00);
    assert_eq!(linear_to_mulaw(1_000), 0xCE);
    assert_eq!(linear_to_mulaw(-1_000), 0x4E);
}

#[test]
fn mulaw_known_expansions() {
    assert_eq!(mulaw_to_linear(0xFF), 0);
    assert_eq!(mulaw_to_linear(0x7F), 0);
    assert_eq!(mulaw_to_linear(0x80), 32_124);
    assert_eq!(mulaw_to_linear(0x00), -32_124);
    assert_eq!(mulaw_to_linear(linear_to_mulaw(1_000)), 988);
}

#[test]
fn mulaw_roundtrip_error_is_segment_bounded() {
    for value in -32_635i32..=32_635 {
        let sample = value as i16;
        let code = linear_to_mulaw(sample);
        let exponent = i32::from((!code >> 4) & 0x07);
        let back = i32::from(mulaw_to_linear(code));
        let bound = 4 << exponent;
        assert!(
            (back - value).abs() <= bound,
            "{value} -> {code:#04x} -> {back} (bound {bound})"
        );
        assert!(back.signum() * value.signum() >= 0);
    }
}

#[test]
fn mulaw_relative_error_is_small_above_noise_floor() {
    for value in (1_024i32..=32_000).step_by(7) {
        for signed in [value, -value] {
            let back = f64::from(mulaw_to_linear(linear_to_mulaw(signed as i16)));
            let rel = (back - f64::from(signed)).abs() / f64::from(value);
            assert!(rel <= 0.07, "{signed}: relative error {rel}");
        }
    }
}

#[test]
fn mulaw_codes_are_monotonic() {
    let mut previous = i32::from(mulaw_to_linear(linear_to_mulaw(i16::MIN)));
    for value in (i16::MIN as i32..=i16::MAX as i32).step_by(16) {
        let decoded = i32::from(mulaw_to_linear(linear_to_mulaw(value as i16)));
        assert!(decoded >= previous, "non-monotonic at {value}");
        previous = decoded;
    }
}

#[test]
fn encode_and_decode_blocks() {
    let bytes = encode(&[0.0, 1.0, -1.0]);
    assert_eq!(bytes, vec![0xFF, 0x80, 0x00]);
    assert_eq!(decode(&bytes), vec![0, 32_124, -32_124]);
    assert!(encode(&[]).is_empty());
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

#[test]
fn chunker_emits_exact_sizes_and_preserves_bytes() {
    let mut aggregator = ChunkAggregator::new(320);
    let input: Vec<u8> = (0..5_000u32).map(|n| (n % 251) as u8).collect();
    let mut chunks = Vec::new();
    for block in input.chunks(107) {
        chunks.extend(aggregator.aggregate(block));
        assert!(aggregator.pending_len() < 320);
    }
    assert_eq!(chunks.len(), 5_000 / 320);
    assert!(chunks.iter().all(|chunk| chunk.len() == 320));
    let tail = aggregator.flush().expect("remainder");
    assert_eq!(tail.len(), 5_000 % 320);

    let rejoined: Vec<u8> = chunks.into_iter().flatten().chain(tail).collect();
    assert_eq!(rejoined, input);
}

#[test]
fn chunker_handles_blocks_larger_than_a_chunk() {
    let mut aggregator = ChunkAggregator::new(4);
    let emitted = aggregator.aggregate_with(&[1, 2, 3, 4, 5, 6, 7, 8, 9], |_| {});
    assert_eq!(emitted, 2);
    assert_eq!(aggregator.pending_len(), 1);
}

#[test]
fn chunker_flush_and_clear() {
    let mut aggregator = ChunkAggregator::new(4);
    assert!(aggregator.flush().is_none());
    aggregator.aggregate(&[1, 2]);
    aggregator.clear();
    assert!(aggregator.flush().is_none());
    assert_eq!(ChunkAggregator::new(0).bytes_per_chunk(), 1);
}

// ---------------------------------------------------------------------------
// Pipeline and capture
// ---------------------------------------------------------------------------

#[test]
fn pipeline_emits_fixed_size_chunks() {
    let mut pipeline = StreamPipeline::new(PipelineConfig::default());
    let signal = sine(48_000, 440.0, 0.5, 48_000);
    let mut chunks = Vec::new();
    let mut produced = 0;
    for frame in signal.chunks(128) {
        produced += pipeline.push_frame_with(frame, |chunk| chunks.push(chunk));
    }
    assert!(chunks.iter().all(|chunk| chunk.len() == 320));
    assert_eq!(chunks.len(), produced / 320);
    assert_eq!(pipeline.pending_bytes(), produced % 320);
    assert!((produced as i64 - 16_000).abs() <= 1);
}

#[test]
fn pipeline_ignores_empty_frames() {
    let mut pipeline = StreamPipeline::new(PipelineConfig::default());
    assert!(pipeline.push_frame(&[]).is_empty());
    assert_eq!(pipeline.pending_bytes(), 0);
    assert!(pipeline.reducer().profile().is_profiling());
    assert_eq!(pipeline.reducer().profile().profiled_samples(), 0);
}

#[test]
fn pipeline_reset_starts_over() {
    let mut pipeline = StreamPipeline::new(PipelineConfig::default());
    pipeline.push_frame(&vec![0.1; 9_000]);
    assert_eq!(pipeline.reducer().profile().profiled_samples(), 3_000);
    assert_eq!(pipeline.pending_bytes(), 3_000 % 320);
    pipeline.reset();
    assert_eq!(pipeline.pending_bytes(), 0);
    assert_eq!(pipeline.reducer().profile().profiled_samples(), 0);
    assert_eq!(pipeline.last_levels(), FrameLevels::SILENT);
    assert!(pipeline.flush().is_none());
}

#[test]
fn pipeline_reports_levels_around_the_gate() {
    let mut pipeline = StreamPipeline::new(PipelineConfig::default());
    pipeline.push_frame(&vec![0.0; 14_400]);
    assert_eq!(pipeline.last_levels(), FrameLevels::SILENT);

    let tone = sine(48_000, 1_000.0, 0.5, 9_600);
    for frame in tone.chunks(480) {
        pipeline.push_frame(frame);
    }
    let levels = pipeline.last_levels();
    // 0.5 amplitude sine is about -9 dBFS and passes the gate untouched.
    assert!((levels.input_db + 9.03).abs() < 0.2, "{levels:?}");
    assert!(levels.reduction_db() < 1.0, "{levels:?}");
}

#[test]
fn pipeline_flush_returns_short_remainder() {
    let mut pipeline = StreamPipeline::new(PipelineConfig::default());
    let chunks = pipeline.push_frame(&vec![0.0; 1_500]);
    assert_eq!(chunks.len(), 1);
    let tail = pipeline.flush().expect("remainder");
    assert_eq!(tail.len(), 500 - 320);
    assert!(pipeline.flush().is_none());
}

#[test]
fn synthetic_capture_replays_frames() {
    let mut device = SyntheticCapture::new((0..1_000).map(|n| n as f32).collect(), 300, 48_000);
    assert_eq!(device.sample_rate().unwrap(), 48_000);
    let stream = device.start().unwrap();
    assert!(device.start().is_err());
    let frames: Vec<Vec<f32>> = stream.iter().collect();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3].len(), 100);
    assert_eq!(frames[1][0], 300.0);
    assert_eq!(stream.dropped_frames(), 0);
    device.stop();
    device.stop();
}

#[test]
fn paced_capture_stops_early() {
    let mut device = SyntheticCapture::new(vec![0.0; 48_000 * 10], 480, 48_000).paced();
    let stream = device.start().unwrap();
    let first = stream.recv_timeout(std::time::Duration::from_secs(1));
    assert!(first.is_ok());
    device.stop();
    let remaining = stream.iter().count();
    assert!(remaining < 1_000);
}
