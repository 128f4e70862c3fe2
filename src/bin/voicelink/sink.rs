//! Byte and control sinks for the streamer.
//!
//! Chunks are written on their own thread so a slow consumer only ever fills
//! the bounded chunk queue; the capture loop never waits on I/O.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use tracing::warn;
use voicelink::ControlMessage;

pub(crate) type ChunkSink = Box<dyn Write + Send>;

/// `-` means stdout; no path means count only.
pub(crate) fn open_chunk_sink(path: Option<&Path>) -> Result<ChunkSink> {
    match path {
        None => Ok(Box::new(io::sink())),
        Some(path) if path.as_os_str() == "-" => Ok(Box::new(io::stdout())),
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

/// Drain chunks into `sink` until every sender is gone. Returns bytes written.
///
/// A write failure stops the thread; dropping the receiver then closes the
/// dispatcher on the capture side.
pub(crate) fn spawn_chunk_writer<W>(
    mut sink: W,
    chunks: Receiver<Vec<u8>>,
) -> thread::JoinHandle<u64>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        let mut written = 0u64;
        for chunk in chunks.iter() {
            if let Err(err) = sink.write_all(&chunk) {
                warn!(%err, written, "chunk output failed; closing sink");
                return written;
            }
            written += chunk.len() as u64;
        }
        if let Err(err) = sink.flush() {
            warn!(%err, "failed to flush chunk output");
        }
        written
    })
}

/// Newline-delimited JSON control messages (stderr unless a path is given).
pub(crate) struct ControlLog {
    out: Box<dyn Write>,
}

impl ControlLog {
    pub(crate) fn open(path: Option<&Path>) -> Result<Self> {
        let out: Box<dyn Write> = match path {
            None => Box::new(io::stderr()),
            Some(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| {
                        format!("failed to open control log '{}'", path.display())
                    })?,
            ),
        };
        Ok(Self::with_writer(out))
    }

    pub(crate) fn with_writer(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub(crate) fn send(&mut self, message: &ControlMessage) -> Result<()> {
        let line = message
            .to_json_line()
            .context("failed to serialize control message")?;
        writeln!(self.out, "{line}").context("failed to write control message")?;
        self.out.flush().context("failed to flush control log")?;
        Ok(())
    }
}
