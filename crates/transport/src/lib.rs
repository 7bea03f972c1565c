//! WebRTC transport for the realtime voice client
//!
//! Wraps the `webrtc` crate's peer connection with the three pipelines this
//! client needs: an outbound Opus track fed by the microphone adapter, an
//! inbound playback relay per remote audio track, and a transcript relay for
//! the server-created control channel.

pub mod codec;
pub mod mic;
pub mod peer;

pub use codec::{OpusDecoder, OpusEncoder};
pub use mic::MicrophoneTrack;
pub use peer::{answer_offer, ingest_control, PeerHandle};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Audio device error: {0}")]
    Device(#[from] voice_client_audio::AudioError),

    #[error("Internal error: {0}")]
    Internal(String),
}
