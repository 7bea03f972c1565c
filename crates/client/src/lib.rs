//! Realtime voice client for Azure OpenAI
//!
//! Bridges the local microphone and speakers to a realtime deployment over
//! WebRTC: negotiate an ephemeral session, trade SDP with the regional
//! realtime endpoint, stream Opus both ways, and relay transcript events
//! from the server's control channel.

pub mod error;
pub mod negotiation;
pub mod session;

pub use error::ClientError;
pub use negotiation::{NegotiatedSession, NegotiationClient};
pub use session::{RealtimeClient, SessionState};
