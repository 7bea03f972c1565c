//! Client error taxonomy
//!
//! Each connection phase has its own variant so callers can tell a rejected
//! session request from a failed SDP exchange from a local transport fault.

use thiserror::Error;

use voice_client_config::ConfigError;
use voice_client_transport::TransportError;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Settings missing or invalid before any network activity
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Lifecycle operation attempted from a state that does not allow it,
    /// e.g. `connect` on a connected or closed session
    #[error("Operation invalid in session state {0:?}")]
    InvalidState(SessionState),

    /// Session endpoint rejected the create request
    #[error("Session negotiation failed (HTTP {status}): {body}")]
    SessionNegotiation { status: u16, body: String },

    /// Realtime endpoint rejected the SDP offer
    #[error("SDP handshake failed (HTTP {status}): {body}")]
    Handshake { status: u16, body: String },

    /// Local media or peer connection failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request never reached the service (DNS, TLS, connect, decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
