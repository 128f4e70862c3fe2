//! Capture-device abstraction.
//!
//! A device turns on with `start()`, which yields a stream of mono host-rate
//! frames, and turns off with `stop()`. Platform plumbing (device discovery,
//! sample formats, callback threads) stays behind the trait.

use anyhow::{bail, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Host audio source delivering mono `f32` frames at a fixed native rate.
pub trait CaptureDevice {
    fn name(&self) -> String;

    /// Native sample rate the frames will arrive at.
    fn sample_rate(&self) -> Result<u32>;

    /// Begin delivering frames. Fails if the device is already running.
    fn start(&mut self) -> Result<FrameStream>;

    /// Stop delivering frames. Safe to call more than once.
    fn stop(&mut self);
}

/// Receiving end of a running capture. Ends once the device stops.
#[derive(Debug)]
pub struct FrameStream {
    receiver: Receiver<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl FrameStream {
    pub(crate) fn new(receiver: Receiver<Vec<f32>>, dropped: Arc<AtomicUsize>, sample_rate: u32) -> Self {
        Self {
            receiver,
            dropped,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<f32>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator over frames until the device stops.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, Vec<f32>> {
        self.receiver.iter()
    }

    /// Frames the device discarded because the consumer fell behind.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Replays a prepared buffer as fixed-size host frames.
///
/// Without pacing every frame is queued up front and the stream ends right
/// after the last one. With pacing a worker thread releases one frame per
/// frame period, like a real device callback.
pub struct SyntheticCapture {
    samples: Arc<Vec<f32>>,
    frame_len: usize,
    sample_rate: u32,
    paced: bool,
    stop_flag: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    running: bool,
}

impl SyntheticCapture {
    pub fn new(samples: Vec<f32>, frame_len: usize, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            frame_len: frame_len.max(1),
            sample_rate,
            paced: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
            running: false,
        }
    }

    /// Release frames in real time instead of all at once.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_len as f64 / f64::from(self.sample_rate.max(1)))
    }
}

impl CaptureDevice for SyntheticCapture {
    fn name(&self) -> String {
        "synthetic".to_string()
    }

    fn sample_rate(&self) -> Result<u32> {
        Ok(self.sample_rate)
    }

    fn start(&mut self) -> Result<FrameStream> {
        if self.running {
            bail!("synthetic capture already running");
        }
        let (sender, receiver) = unbounded();
        let dropped = Arc::new(AtomicUsize::new(0));
        self.stop_flag.store(false, Ordering::Relaxed);
        self.running = true;

        if self.paced {
            let samples = Arc::clone(&self.samples);
            let frame_len = self.frame_len;
            let period = self.frame_period();
            let stop_flag = Arc::clone(&self.stop_flag);
            self.worker = Some(thread::spawn(move || {
                for frame in samples.chunks(frame_len) {
                    if stop_flag.load(Ordering::Relaxed) || sender.send(frame.to_vec()).is_err() {
                        break;
                    }
                    thread::sleep(period);
                }
            }));
        } else {
            for frame in self.samples.chunks(self.frame_len) {
                if sender.send(frame.to_vec()).is_err() {
                    break;
                }
            }
        }

        debug!(
            sample_rate = self.sample_rate,
            frame_len = self.frame_len,
            paced = self.paced,
            "synthetic capture started"
        );
        Ok(FrameStream::new(receiver, dropped, self.sample_rate))
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.running = false;
        debug!("synthetic capture stopped");
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
