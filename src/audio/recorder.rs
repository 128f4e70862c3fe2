//! System microphone capture via CPAL.
//!
//! Handles device enumeration and sample-format conversion. Each host callback
//! is downmixed to mono and forwarded as one frame at the device's native rate;
//! resampling happens later in the pipeline.

use super::capture::{CaptureDevice, FrameStream};
use super::dispatch::append_downmixed_samples;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Frames buffered between the device callback and the pipeline thread.
const FRAME_QUEUE_CAPACITY: usize = 256;

/// Audio input device wrapper implementing [`CaptureDevice`].
pub struct Recorder {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open the named input device, or the system default when `None`.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self {
            device,
            stream: None,
        })
    }

    fn build_stream(
        &self,
        format: SampleFormat,
        config: &StreamConfig,
        sender: Sender<Vec<f32>>,
        dropped: Arc<AtomicUsize>,
    ) -> Result<cpal::Stream> {
        let channels = usize::from(config.channels.max(1));
        let err_fn = |err: cpal::StreamError| warn!(%err, "audio stream error");

        let stream = match format {
            SampleFormat::F32 => self.device.build_input_stream(
                config,
                move |data: &[f32], _| forward_frame(&sender, &dropped, data, channels, |s| s),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => self.device.build_input_stream(
                config,
                move |data: &[i16], _| {
                    forward_frame(&sender, &dropped, data, channels, |s| s as f32 / 32_768.0)
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                config,
                move |data: &[u16], _| {
                    forward_frame(&sender, &dropped, data, channels, |s| {
                        (s as f32 - 32_768.0) / 32_768.0
                    })
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };
        Ok(stream)
    }
}

/// Runs on the device callback thread: downmix, then hand off without blocking.
fn forward_frame<T, F>(
    sender: &Sender<Vec<f32>>,
    dropped: &AtomicUsize,
    data: &[T],
    channels: usize,
    convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if data.is_empty() {
        return;
    }
    let mut frame = Vec::with_capacity(data.len() / channels.max(1) + 1);
    append_downmixed_samples(&mut frame, data, channels, convert);
    if let Err(TrySendError::Full(_)) = sender.try_send(frame) {
        dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl CaptureDevice for Recorder {
    fn name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    fn sample_rate(&self) -> Result<u32> {
        let config = self
            .device
            .default_input_config()
            .context("failed to query default input config")?;
        Ok(config.sample_rate().0)
    }

    fn start(&mut self) -> Result<FrameStream> {
        if self.stream.is_some() {
            return Err(anyhow!("recorder already running"));
        }
        let default_config = self
            .device
            .default_input_config()
            .context("failed to query default input config")?;
        let format = default_config.sample_format();
        let config: StreamConfig = default_config.into();
        let sample_rate = config.sample_rate.0;

        info!(
            device = %self.name(),
            ?format,
            sample_rate,
            channels = config.channels,
            "starting capture"
        );

        let (sender, receiver) = bounded::<Vec<f32>>(FRAME_QUEUE_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let stream = self.build_stream(format, &config, sender, Arc::clone(&dropped))?;
        stream.play().context("failed to start input stream")?;
        self.stream = Some(stream);
        Ok(FrameStream::new(receiver, dropped, sample_rate))
    }

    fn stop(&mut self) {
        // Dropping the stream drops the callback and its sender, which ends the FrameStream.
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                debug!(%err, "failed to pause audio stream");
            }
            info!(device = %self.name(), "capture stopped");
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}
