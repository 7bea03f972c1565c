//! Opus encode/decode
//!
//! Thin wrappers over audiopus with interior mutability so encoder and
//! decoder handles can be shared across tasks the same way the peer
//! connection is.

use audiopus::coder;
use audiopus::packet::Packet;
use audiopus::{Application, MutSignals};
use parking_lot::Mutex;

use voice_client_core::{Channels, SampleRate};

use crate::TransportError;

/// Maximum Opus packet size this client produces (one 20ms mono frame)
const MAX_PACKET_BYTES: usize = 1500;

fn opus_sample_rate(rate: SampleRate) -> Result<audiopus::SampleRate, TransportError> {
    match rate {
        SampleRate::Hz8000 => Ok(audiopus::SampleRate::Hz8000),
        SampleRate::Hz16000 => Ok(audiopus::SampleRate::Hz16000),
        SampleRate::Hz24000 => Ok(audiopus::SampleRate::Hz24000),
        SampleRate::Hz48000 => Ok(audiopus::SampleRate::Hz48000),
    }
}

fn opus_channels(channels: Channels) -> audiopus::Channels {
    match channels {
        Channels::Mono => audiopus::Channels::Mono,
        Channels::Stereo => audiopus::Channels::Stereo,
    }
}

/// Opus encoder for the outbound microphone track
pub struct OpusEncoder {
    encoder: Mutex<coder::Encoder>,
}

impl OpusEncoder {
    pub fn new(rate: SampleRate, channels: Channels) -> Result<Self, TransportError> {
        let encoder = coder::Encoder::new(
            opus_sample_rate(rate)?,
            opus_channels(channels),
            Application::Voip,
        )
        .map_err(|e| TransportError::Codec(e.to_string()))?;

        Ok(Self {
            encoder: Mutex::new(encoder),
        })
    }

    /// Encode one PCM frame (f32, normalized) into an Opus packet
    pub fn encode(&self, samples: &[f32]) -> Result<Vec<u8>, TransportError> {
        let mut output = vec![0u8; MAX_PACKET_BYTES];
        let len = self
            .encoder
            .lock()
            .encode_float(samples, &mut output)
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        output.truncate(len);
        Ok(output)
    }
}

/// Opus decoder for inbound audio tracks
pub struct OpusDecoder {
    decoder: Mutex<coder::Decoder>,
    rate: SampleRate,
    channels: Channels,
}

impl OpusDecoder {
    pub fn new(rate: SampleRate, channels: Channels) -> Result<Self, TransportError> {
        let decoder = coder::Decoder::new(opus_sample_rate(rate)?, opus_channels(channels))
            .map_err(|e| TransportError::Codec(e.to_string()))?;

        Ok(Self {
            decoder: Mutex::new(decoder),
            rate,
            channels,
        })
    }

    /// Capacity for the longest Opus frame (120ms) at the decoder's rate
    fn max_frame_samples(&self) -> usize {
        (self.rate.as_u32() as usize * 120) / 1000
    }

    /// Decode one Opus packet into interleaved f32 samples
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<f32>, TransportError> {
        let packet = Packet::try_from(payload).map_err(|e| TransportError::Codec(e.to_string()))?;
        let mut samples = vec![0f32; self.max_frame_samples() * self.channels.count()];
        let frames = self
            .decoder
            .lock()
            .decode_float(
                Some(packet),
                MutSignals::try_from(&mut samples)
                    .map_err(|e| TransportError::Codec(e.to_string()))?,
                false,
            )
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        samples.truncate(frames * self.channels.count());
        Ok(samples)
    }

    /// Packet-loss concealment: synthesize one 20ms frame for a lost packet
    pub fn decode_plc(&self) -> Result<Vec<f32>, TransportError> {
        let plc_samples = self.rate.frame_size_20ms();
        let mut samples = vec![0f32; plc_samples * self.channels.count()];
        let frames = self
            .decoder
            .lock()
            .decode_float(
                Option::<Packet>::None,
                MutSignals::try_from(&mut samples)
                    .map_err(|e| TransportError::Codec(e.to_string()))?,
                false,
            )
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        samples.truncate(frames * self.channels.count());
        Ok(samples)
    }
}
