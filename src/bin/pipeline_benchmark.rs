use std::f32::consts::PI;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use voicelink::audio::{mulaw, CaptureDevice, StreamPipeline, SyntheticCapture};
use voicelink::config::{
    PipelineConfig, DEFAULT_CHUNK_MS, DEFAULT_HOST_SAMPLE_RATE, DEFAULT_NOISE_PROFILE_MS,
    DEFAULT_TARGET_SAMPLE_RATE,
};

/// Synthetic benchmark harness for the streaming pipeline.
#[derive(Debug, Parser)]
#[command(about = "Benchmark per-frame pipeline cost with a synthetic tone")]
struct Args {
    /// Human-friendly label recorded in the output metrics
    #[arg(long, default_value = "tone")]
    label: String,

    /// Simulated device rate (Hz)
    #[arg(long = "host-sample-rate", default_value_t = DEFAULT_HOST_SAMPLE_RATE)]
    host_sample_rate: u32,

    #[arg(long = "target-sample-rate", default_value_t = DEFAULT_TARGET_SAMPLE_RATE)]
    target_sample_rate: u32,

    #[arg(long = "chunk-ms", default_value_t = DEFAULT_CHUNK_MS)]
    chunk_ms: u32,

    #[arg(long = "noise-profile-ms", default_value_t = DEFAULT_NOISE_PROFILE_MS)]
    noise_profile_ms: u32,

    /// Host samples per callback frame
    #[arg(long = "frame-len", default_value_t = 128)]
    frame_len: usize,

    /// Tone frequency (Hz)
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,

    /// Tone amplitude (0.0-1.0)
    #[arg(long, default_value_t = 0.5)]
    amplitude: f32,

    /// Length of the synthetic clip (milliseconds)
    #[arg(long = "duration-ms", default_value_t = 2_000)]
    duration_ms: u64,
}

#[derive(Debug, Default)]
struct BenchMetrics {
    frames: usize,
    chunks: usize,
    bytes_per_chunk: usize,
    max_frame_us: u128,
    total_frame_us: u128,
    snr_db: f64,
}

impl BenchMetrics {
    fn mean_frame_us(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_frame_us as f64 / self.frames as f64
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_pipeline_config(&args);
    config.validate()?;
    let clip = synthesize_tone(&args);
    let metrics = run_benchmark(&args, config, clip)?;

    println!(
        "pipeline_metrics|label={}|frames={}|chunks={}|bytes_per_chunk={}|max_frame_us={}|mean_frame_us={:.1}|snr_db={:.1}",
        args.label,
        metrics.frames,
        metrics.chunks,
        metrics.bytes_per_chunk,
        metrics.max_frame_us,
        metrics.mean_frame_us(),
        metrics.snr_db,
    );
    Ok(())
}

fn build_pipeline_config(args: &Args) -> PipelineConfig {
    PipelineConfig {
        target_sample_rate: args.target_sample_rate,
        chunk_ms: args.chunk_ms,
        noise_profile_ms: args.noise_profile_ms,
        ..PipelineConfig::with_host_rate(args.host_sample_rate)
    }
}

/// Silence for the profiling window, then the tone. A session profiles
/// whatever it hears first, so the tone must not start before profiling ends.
fn synthesize_tone(args: &Args) -> Vec<f32> {
    let rate = u64::from(args.host_sample_rate);
    let lead = (u64::from(args.noise_profile_ms) * rate / 1000) as usize;
    let len = (args.duration_ms * rate / 1000) as usize;
    let step = 2.0 * PI * args.tone_hz / args.host_sample_rate as f32;
    let mut clip = vec![0.0; lead];
    clip.extend((0..len).map(|n| (step * n as f32).sin() * args.amplitude));
    clip
}

fn run_benchmark(args: &Args, config: PipelineConfig, clip: Vec<f32>) -> Result<BenchMetrics> {
    let mut device = SyntheticCapture::new(clip, args.frame_len, config.host_sample_rate);
    let frames = device.start()?;
    let mut pipeline = StreamPipeline::new(config);
    let mut metrics = BenchMetrics {
        bytes_per_chunk: pipeline.config().bytes_per_chunk(),
        ..BenchMetrics::default()
    };
    let mut decoded = Vec::new();

    for frame in frames.iter() {
        let started = Instant::now();
        let chunks = pipeline.push_frame(&frame);
        let elapsed = started.elapsed().as_micros();
        metrics.frames += 1;
        metrics.max_frame_us = metrics.max_frame_us.max(elapsed);
        metrics.total_frame_us += elapsed;
        metrics.chunks += chunks.len();
        for chunk in &chunks {
            decoded.extend(mulaw::decode(chunk));
        }
    }
    device.stop();

    let target_rate = pipeline.config().target_sample_rate;
    let skip = pipeline.config().noise_profile_samples();
    metrics.snr_db = tone_snr_db(&decoded, skip, args.tone_hz, args.amplitude, target_rate);
    Ok(metrics)
}

/// Decoded output against the ideal tone at the target rate. The tone starts
/// right after the `skip` profiling samples.
fn tone_snr_db(decoded: &[i16], skip: usize, tone_hz: f32, amplitude: f32, rate: u32) -> f64 {
    if decoded.len() <= skip {
        return 0.0;
    }
    let omega = 2.0 * std::f64::consts::PI * f64::from(tone_hz) / f64::from(rate);
    let mut signal = 0.0f64;
    let mut error = 0.0f64;
    for (n, &sample) in decoded.iter().enumerate().skip(skip) {
        let reference = f64::from(amplitude) * (omega * (n - skip) as f64).sin();
        let diff = f64::from(sample) / 32_768.0 - reference;
        signal += reference * reference;
        error += diff * diff;
    }
    if error <= f64::EPSILON {
        return 99.0;
    }
    10.0 * (signal / error).log10()
}
