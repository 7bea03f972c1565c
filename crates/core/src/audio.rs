//! Audio frame types and PCM16 conversion

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// PCM16 normalization constant (i16 -> f32)
const PCM16_NORMALIZE: f32 = 32768.0;
/// PCM16 scaling constant (f32 -> i16)
const PCM16_SCALE: f32 = 32767.0;

/// Supported audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// 8kHz - Telephony
    Hz8000,
    /// 16kHz - Standard speech recognition
    Hz16000,
    /// 24kHz - Realtime API capture/playback rate
    #[default]
    Hz24000,
    /// 48kHz - Professional audio / Opus native
    Hz48000,
}

impl SampleRate {
    /// Get sample rate as u32
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz24000 => 24000,
            SampleRate::Hz48000 => 48000,
        }
    }

    /// Get frame size for a 20ms block
    pub fn frame_size_20ms(&self) -> usize {
        (self.as_u32() as usize * 20) / 1000
    }

    /// Map a rate in Hz onto a supported variant
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(SampleRate::Hz8000),
            16000 => Some(SampleRate::Hz16000),
            24000 => Some(SampleRate::Hz24000),
            48000 => Some(SampleRate::Hz48000),
            _ => None,
        }
    }
}

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Channels {
    #[default]
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(&self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Audio frame with metadata
///
/// Samples are stored as f32 normalized to [-1.0, 1.0). The presentation
/// timestamp (`pts`) counts samples from the start of the stream.
#[derive(Clone)]
pub struct AudioFrame {
    /// Raw audio samples (f32, normalized)
    pub samples: Arc<[f32]>,
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Number of channels
    pub channels: Channels,
    /// Presentation timestamp in samples
    pub pts: u64,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("pts", &self.pts)
            .finish()
    }
}

impl AudioFrame {
    /// Create a new audio frame from f32 samples
    pub fn new(samples: Vec<f32>, sample_rate: SampleRate, channels: Channels, pts: u64) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
            pts,
        }
    }

    /// Convert from PCM16 samples, normalizing into [-1.0, 1.0)
    pub fn from_pcm16(
        samples: &[i16],
        sample_rate: SampleRate,
        channels: Channels,
        pts: u64,
    ) -> Self {
        let normalized: Vec<f32> = samples.iter().map(|&s| s as f32 / PCM16_NORMALIZE).collect();
        Self::new(normalized, sample_rate, channels, pts)
    }

    /// Convert to PCM16 samples, clamping out-of-range values
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&sample| (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16)
            .collect()
    }

    /// Duration of this frame
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(
            self.samples.len() as f64
                / (self.sample_rate.as_u32() as f64 * self.channels.count() as f64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_conversions() {
        assert_eq!(SampleRate::Hz24000.as_u32(), 24000);
        assert_eq!(SampleRate::Hz24000.frame_size_20ms(), 480);
        assert_eq!(SampleRate::Hz16000.frame_size_20ms(), 320);
    }

    #[test]
    fn test_from_pcm16_normalization() {
        let frame = AudioFrame::from_pcm16(
            &[16384, -16384, 0],
            SampleRate::Hz24000,
            Channels::Mono,
            0,
        );
        assert_eq!(frame.samples.len(), 3);
        assert!((frame.samples[0] - 0.5).abs() < 1e-6);
        assert!((frame.samples[1] + 0.5).abs() < 1e-6);
        assert_eq!(frame.samples[2], 0.0);
    }

    #[test]
    fn test_to_pcm16_clamps() {
        let frame = AudioFrame::new(
            vec![1.5, -1.5, 0.0],
            SampleRate::Hz24000,
            Channels::Mono,
            0,
        );
        let pcm = frame.to_pcm16();
        assert_eq!(pcm, vec![32767, -32767, 0]);
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 480], SampleRate::Hz24000, Channels::Mono, 0);
        assert_eq!(frame.duration(), Duration::from_millis(20));
    }
}
