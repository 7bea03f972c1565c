//! Core types for the realtime voice client
//!
//! This crate provides the foundational types shared by the other crates:
//! - Audio frame types and PCM16 conversion
//! - Control-channel message parsing

pub mod audio;
pub mod message;

pub use audio::{AudioFrame, Channels, SampleRate};
pub use message::transcript_text;
