//! Capture track adapter
//!
//! Bridges the push-style hardware capture callback into the pull interface
//! the outbound track pump expects. Blocks arrive on the bounded hand-off
//! queue; `recv` wraps each one into an [`AudioFrame`] tagged with a
//! monotonically advancing presentation timestamp.

use tokio::sync::mpsc;

use voice_client_audio::{CaptureConfig, CaptureStream};
use voice_client_core::{AudioFrame, Channels, SampleRate};

use crate::TransportError;

/// Pull-based microphone frame source.
///
/// The device handle ([`CaptureStream`]) is returned separately so the
/// orchestrator can stop the hardware while this adapter is owned by the
/// outbound pump task; once capture stops the queue closes and `recv`
/// returns `None`.
pub struct MicrophoneTrack {
    rx: mpsc::Receiver<Vec<i16>>,
    sample_rate: SampleRate,
    channels: Channels,
    pts: u64,
}

impl MicrophoneTrack {
    /// Open the default microphone and start capturing
    pub fn open(config: &CaptureConfig) -> Result<(Self, CaptureStream), TransportError> {
        let sample_rate = SampleRate::from_hz(config.sample_rate).ok_or_else(|| {
            TransportError::Media(format!("unsupported capture rate: {}", config.sample_rate))
        })?;
        let (capture, rx) = CaptureStream::open(config)?;
        Ok((Self::from_receiver(rx, sample_rate), capture))
    }

    /// Build an adapter over an existing block source (tests, custom feeds)
    pub fn from_receiver(rx: mpsc::Receiver<Vec<i16>>, sample_rate: SampleRate) -> Self {
        Self {
            rx,
            sample_rate,
            channels: Channels::Mono,
            pts: 0,
        }
    }

    /// Sample rate frames are tagged with
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Await the next captured block.
    ///
    /// Suspends while the queue is empty; returns `None` only once capture
    /// has stopped. The presentation timestamp advances by each block's
    /// sample count, so gaps from dropped blocks never reorder frames.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        let block = self.rx.recv().await?;
        let frame = AudioFrame::from_pcm16(&block, self.sample_rate, self.channels, self.pts);
        self.pts += block.len() as u64;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_preserves_order_and_advances_pts() {
        let (tx, rx) = mpsc::channel(8);
        let mut mic = MicrophoneTrack::from_receiver(rx, SampleRate::Hz24000);

        for i in 0..3i16 {
            tx.send(vec![i * 100; 480]).await.unwrap();
        }

        let first = mic.recv().await.unwrap();
        assert_eq!(first.pts, 0);
        assert_eq!(first.samples.len(), 480);
        assert_eq!(first.samples[0], 0.0);

        let second = mic.recv().await.unwrap();
        assert_eq!(second.pts, 480);
        assert!((second.samples[0] - 100.0 / 32768.0).abs() < 1e-6);

        let third = mic.recv().await.unwrap();
        assert_eq!(third.pts, 960);
    }

    #[tokio::test]
    async fn test_recv_none_after_source_closes() {
        let (tx, rx) = mpsc::channel(8);
        let mut mic = MicrophoneTrack::from_receiver(rx, SampleRate::Hz24000);

        tx.send(vec![0; 480]).await.unwrap();
        drop(tx);

        assert!(mic.recv().await.is_some());
        assert!(mic.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pts_counts_samples_for_short_blocks() {
        let (tx, rx) = mpsc::channel(8);
        let mut mic = MicrophoneTrack::from_receiver(rx, SampleRate::Hz24000);

        tx.send(vec![0; 120]).await.unwrap();
        tx.send(vec![0; 480]).await.unwrap();

        assert_eq!(mic.recv().await.unwrap().pts, 0);
        assert_eq!(mic.recv().await.unwrap().pts, 120);
    }
}
