use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, warn};

const DROP_LOG_EVERY: usize = 100;

/// Downmix multi-channel input to mono while applying the provided converter,
/// so the pipeline always sees a single channel regardless of the mic layout.
pub fn append_downmixed_samples<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    // Average each interleaved frame to produce a mono representation.
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Non-blocking hand-off from the audio context to the transport.
///
/// Chunks go through a bounded channel with `try_send`. A full channel drops
/// the chunk and bumps the shared counter; a disconnected receiver closes the
/// dispatcher and later chunks are discarded. Neither case reaches the pipeline.
#[derive(Debug)]
pub struct ChunkDispatcher {
    sender: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
    sent: usize,
    closed: bool,
}

impl ChunkDispatcher {
    pub fn new(sender: Sender<Vec<u8>>, dropped: Arc<AtomicUsize>) -> Self {
        Self {
            sender,
            dropped,
            sent: 0,
            closed: false,
        }
    }

    /// Dispatcher plus the receiving end a transport thread drains.
    pub fn channel(capacity: usize) -> (Self, Receiver<Vec<u8>>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self::new(sender, Arc::new(AtomicUsize::new(0))), receiver)
    }

    /// Returns true when the chunk was queued.
    pub fn dispatch(&mut self, chunk: Vec<u8>) -> bool {
        if self.closed {
            return false;
        }
        match self.sender.try_send(chunk) {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_LOG_EVERY == 0 {
                    warn!(dropped, "transport queue full; dropping chunk");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(sent = self.sent, "transport receiver gone; closing dispatcher");
                self.closed = true;
                false
            }
        }
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared drop counter, for observers outside the audio context.
    pub fn dropped_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.dropped)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
