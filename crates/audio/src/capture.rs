//! Microphone capture using cpal
//!
//! The hardware callback runs on the audio subsystem's own thread. Each
//! completed block is copied out of the driver buffer and offered to a
//! bounded queue with `try_send`; when the consumer lags, the incoming block
//! is dropped. Better a gap than a blocked capture thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::AudioError;

/// Capture stream parameters
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Samples per block (480 = 20ms at 24kHz mono)
    pub block_size: usize,
    /// Hand-off queue capacity in blocks
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            block_size: 480,
            queue_capacity: 8,
        }
    }
}

/// Producer side of the capture hand-off queue.
///
/// `push` copies the block and never blocks: on a full queue the incoming
/// block is dropped, preserving liveness of the capture callback.
#[derive(Clone)]
pub struct CaptureFeed {
    tx: mpsc::Sender<Vec<i16>>,
}

impl CaptureFeed {
    /// Create a feed and its consumer half with the given capacity
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Vec<i16>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Offer one block to the queue, dropping it if the queue is full
    pub fn push(&self, block: &[i16]) {
        match self.tx.try_send(block.to_vec()) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("capture queue full, dropping block");
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {},
        }
    }
}

/// Handle to a running capture stream.
///
/// The cpal stream is owned by a dedicated thread (cpal's `Stream` is not
/// `Send` on every platform). Dropping or stopping the handle releases the
/// device and closes the hand-off queue.
pub struct CaptureStream {
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream {
    /// Open the default input device and start capturing.
    ///
    /// Returns the stream handle and the consumer side of the hand-off
    /// queue. Device errors during setup are reported here, not deferred.
    pub fn open(config: &CaptureConfig) -> Result<(Self, mpsc::Receiver<Vec<i16>>), AudioError> {
        let (feed, block_rx) = CaptureFeed::bounded(config.queue_capacity);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AudioError>>();

        let config = config.clone();
        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(&config, feed) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    },
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    },
                };
                // Park until stop; dropping the stream releases the device
                // and the feed, which closes the hand-off queue.
                let _ = stop_rx.recv();
                drop(stream);
                debug!("capture stream released");
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            },
            Err(_) => {
                let _ = thread.join();
                return Err(AudioError::Stream("capture thread exited early".to_string()));
            },
        }

        Ok((
            Self {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            },
            block_rx,
        ))
    }

    /// Stop capturing and release the device. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_input_stream(config: &CaptureConfig, feed: CaptureFeed) -> Result<cpal::Stream, AudioError> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| AudioError::Device("no input device available".to_string()))?;

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate = config.sample_rate,
        channels = config.channels,
        "opening capture stream"
    );

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Default,
    };

    let block_size = config.block_size;
    let mut pending: Vec<i16> = Vec::with_capacity(block_size);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // cpal does not guarantee callback sizes; re-block here so
                // every pushed block is exactly block_size samples.
                for &sample in data {
                    pending.push(sample);
                    if pending.len() == block_size {
                        feed.push(&pending);
                        pending.clear();
                    }
                }
            },
            move |err| {
                warn!("capture stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))?;

    stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_drops_newest_when_full() {
        let (feed, mut rx) = CaptureFeed::bounded(8);

        for i in 0..12i16 {
            feed.push(&[i; 4]);
        }

        // The first 8 blocks survive in order; 9..12 were dropped.
        let mut received = Vec::new();
        while let Ok(block) = rx.try_recv() {
            received.push(block[0]);
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_push_after_reads_resumes() {
        let (feed, mut rx) = CaptureFeed::bounded(2);

        feed.push(&[1]);
        feed.push(&[2]);
        feed.push(&[3]); // dropped

        assert_eq!(rx.try_recv().unwrap(), vec![1]);
        feed.push(&[4]);

        assert_eq!(rx.try_recv().unwrap(), vec![2]);
        assert_eq!(rx.try_recv().unwrap(), vec![4]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_push_on_closed_queue_is_silent() {
        let (feed, rx) = CaptureFeed::bounded(2);
        drop(rx);
        feed.push(&[1]);
    }
}
