//! Microphone capture and speaker playback
//!
//! Both cpal's `Stream` and rodio's `OutputStream` are `!Send`, so each
//! device lives on a dedicated thread. The capture thread pushes fixed-size
//! PCM16 blocks onto a bounded hand-off queue (drop-on-full, so the hardware
//! callback never blocks); the playback thread consumes decoded frames and
//! opens the output device lazily once the inbound format is known.

pub mod capture;
pub mod playback;

pub use capture::{CaptureConfig, CaptureFeed, CaptureStream};
pub use playback::Playback;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}
