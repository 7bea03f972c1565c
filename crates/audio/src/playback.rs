//! Speaker playback using rodio
//!
//! A dedicated thread owns the rodio output stream. The output device is
//! opened lazily on the first frame, when the inbound channel count and
//! sample rate are finally known.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

enum PlaybackCommand {
    Frame {
        samples: Vec<f32>,
        channels: u16,
        sample_rate: u32,
    },
    Stop,
}

/// Handle to a playback thread.
///
/// `stop` (or drop) tells the thread to clear its queue and exit, releasing
/// the output device. Frames sent after stop are discarded.
pub struct Playback {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
    thread: Option<JoinHandle<()>>,
}

impl Playback {
    /// Spawn the playback thread. The output device is not touched until
    /// the first frame arrives.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let thread = std::thread::Builder::new()
            .name("speaker-playback".to_string())
            .spawn(move || run(rx))
            .ok();
        Self { tx, thread }
    }

    /// Queue one decoded frame for playback
    pub fn write(&self, samples: Vec<f32>, channels: u16, sample_rate: u32) {
        let _ = self.tx.send(PlaybackCommand::Frame {
            samples,
            channels,
            sample_rate,
        });
    }

    /// Stop playback and release the output device
    pub fn stop(&self) {
        let _ = self.tx.send(PlaybackCommand::Stop);
    }

    /// Stop and wait for the playback thread to exit
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        let _ = self.tx.send(PlaybackCommand::Stop);
    }
}

fn run(mut rx: mpsc::UnboundedReceiver<PlaybackCommand>) {
    // Held for the lifetime of the sink; opened on first frame.
    let mut output: Option<(OutputStream, Sink)> = None;

    while let Some(command) = rx.blocking_recv() {
        match command {
            PlaybackCommand::Frame {
                samples,
                channels,
                sample_rate,
            } => {
                if output.is_none() {
                    match open_output() {
                        Ok(opened) => {
                            debug!(channels, sample_rate, "opened playback stream");
                            output = Some(opened);
                        },
                        Err(e) => {
                            // No device: drop frames, keep draining so the
                            // relay side never blocks.
                            warn!("playback unavailable: {}", e);
                            continue;
                        },
                    }
                }
                if let Some((_, sink)) = &output {
                    sink.append(SamplesBuffer::new(channels, sample_rate, samples));
                }
            },
            PlaybackCommand::Stop => break,
        }
    }

    if let Some((_, sink)) = &output {
        sink.stop();
    }
    debug!("playback stream released");
}

fn open_output() -> Result<(OutputStream, Sink), String> {
    let (stream, handle) = OutputStream::try_default().map_err(|e| e.to_string())?;
    let sink = Sink::try_new(&handle).map_err(|e| e.to_string())?;
    Ok((stream, sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_shutdown_without_frames() {
        // Must not touch the output device when no frame is ever written.
        let playback = Playback::spawn();
        playback.shutdown();
    }

    #[test]
    fn test_write_after_stop_is_silent() {
        let playback = Playback::spawn();
        playback.stop();
        playback.write(vec![0.0; 480], 1, 24_000);
    }
}
