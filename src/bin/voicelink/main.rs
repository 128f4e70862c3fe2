//! VoiceLink entrypoint: microphone in, denoised mu-law chunks out.
//!
//! - Audio callback thread: downmixes device frames and queues them (cpal)
//! - Main thread: runs each frame through the session pipeline
//! - Writer thread: drains finished chunks into the output sink

mod cli_utils;
mod sink;

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use voicelink::audio::{CaptureDevice, ChunkDispatcher, FrameStream, Recorder};
use voicelink::config::AppConfig;
use voicelink::{init_tracing, ControlMessage, StreamSession};

use crate::cli_utils::{format_session_stats, list_input_devices};
use crate::sink::{open_chunk_sink, spawn_chunk_writer, ControlLog};

/// Longest wait for a frame before re-checking the deadline.
const FRAME_POLL_MS: u64 = 50;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_tracing(&config);

    if config.list_input_devices {
        return list_input_devices();
    }

    let tags = config.session_tags()?;
    let mut recorder = Recorder::new(config.input_device.as_deref())?;
    let host_rate = recorder.sample_rate()?;
    let pipeline_config = config
        .pipeline_config(host_rate)
        .with_context(|| format!("input device '{}' is not usable", recorder.name()))?;

    let sink = open_chunk_sink(config.output.as_deref())?;
    let mut control = ControlLog::open(config.control_log.as_deref())?;
    let (dispatcher, chunks) = ChunkDispatcher::channel(config.channel_capacity);
    let writer = spawn_chunk_writer(sink, chunks);

    let mut session = StreamSession::start(pipeline_config.clone(), dispatcher)?
        .with_flush_on_stop(config.flush_on_stop);
    let stream_id = session.stream_id().to_string();
    let announce = ControlMessage::stream_start(&pipeline_config, &stream_id, tags);
    let frames = start_announced(&mut recorder, &mut control, &announce)?;

    let deadline = Duration::from_millis(config.duration_ms);
    run_capture(&frames, &mut session, deadline);
    recorder.stop();

    let stats = session.stop().unwrap_or_default();
    // Dropping the session drops the dispatcher, which lets the writer finish.
    drop(session);
    let bytes_written = match writer.join() {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!("chunk writer thread panicked");
            0
        }
    };

    control.send(&ControlMessage::stream_end(&stream_id))?;
    eprintln!(
        "{}",
        format_session_stats(&stream_id, &stats, bytes_written, frames.dropped_frames())
    );
    Ok(())
}

/// Start the device, then write `stream_start`. Nothing is announced when the
/// device fails, and the device is stopped again when the announcement fails,
/// so every announced stream is later closed by a `stream_end`.
fn start_announced<D: CaptureDevice>(
    device: &mut D,
    control: &mut ControlLog,
    announce: &ControlMessage,
) -> Result<FrameStream> {
    let frames = device
        .start()
        .with_context(|| format!("failed to start input device '{}'", device.name()))?;
    if let Err(err) = control.send(announce) {
        device.stop();
        return Err(err);
    }
    Ok(frames)
}

/// Feed device frames into the session until `duration` passes or the device stops.
fn run_capture(frames: &FrameStream, session: &mut StreamSession, duration: Duration) {
    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= duration {
            break;
        }
        let wait = (duration - elapsed).min(Duration::from_millis(FRAME_POLL_MS));
        match frames.recv_timeout(wait) {
            Ok(frame) => {
                session.push_frame(&frame);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("capture device ended the stream");
                break;
            }
        }
    }
}
