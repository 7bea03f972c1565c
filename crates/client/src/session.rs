//! Session orchestrator
//!
//! Drives one realtime session through its lifecycle: negotiate, bridge the
//! local audio devices over the peer connection, relay transcripts, tear
//! down. All device and network handles live here so `close` can release
//! them in one place.

use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use voice_client_audio::{CaptureConfig, CaptureStream};
use voice_client_config::Settings;
use voice_client_transport::{MicrophoneTrack, PeerHandle};

use crate::error::ClientError;
use crate::negotiation::{NegotiatedSession, NegotiationClient};

/// Session lifecycle. Forward-only: `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    SessionCreated,
    Connecting,
    Connected,
    Closed,
}

/// One realtime voice session
pub struct RealtimeClient {
    settings: Settings,
    negotiation: NegotiationClient,
    state: SessionState,
    session: Option<NegotiatedSession>,
    peer: Option<PeerHandle>,
    capture: Option<CaptureStream>,
    transcript_tx: Option<mpsc::UnboundedSender<String>>,
    transcript_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl RealtimeClient {
    pub fn new(settings: Settings) -> Self {
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        Self {
            negotiation: NegotiationClient::new(settings.clone()),
            settings,
            state: SessionState::Uninitialized,
            session: None,
            peer: None,
            capture: None,
            transcript_tx: Some(transcript_tx),
            transcript_rx: Some(transcript_rx),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id once negotiation has succeeded
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Connection setup is only legal before the session is established;
    /// a connected or closed session must not be reused.
    fn ensure_can_connect(&self) -> Result<(), ClientError> {
        match self.state {
            SessionState::Uninitialized | SessionState::SessionCreated => Ok(()),
            state => Err(ClientError::InvalidState(state)),
        }
    }

    /// Negotiate an ephemeral session. Idempotent: a session already
    /// created is kept.
    pub async fn create_session(&mut self) -> Result<(), ClientError> {
        self.ensure_can_connect()?;
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.negotiation.create_session().await?;
        self.session = Some(session);
        self.state = SessionState::SessionCreated;
        Ok(())
    }

    /// Negotiate (if not yet done), open the default microphone, and
    /// establish the media connection.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.ensure_can_connect()?;
        self.create_session().await?;

        let capture_config = CaptureConfig {
            sample_rate: self.settings.audio.sample_rate,
            channels: self.settings.audio.channels,
            block_size: self.settings.audio.block_size,
            queue_capacity: self.settings.audio.queue_capacity,
        };
        let (mic, capture) = MicrophoneTrack::open(&capture_config)?;
        self.capture = Some(capture);

        self.establish(mic).await
    }

    /// Like [`connect`](Self::connect) but with a caller-supplied frame
    /// source instead of the hardware microphone
    pub async fn connect_with_source(&mut self, mic: MicrophoneTrack) -> Result<(), ClientError> {
        self.ensure_can_connect()?;
        self.create_session().await?;
        self.establish(mic).await
    }

    async fn establish(&mut self, mic: MicrophoneTrack) -> Result<(), ClientError> {
        // create_session ran first, so the credential is present here
        let bearer = match &self.session {
            Some(session) => session.bearer.clone(),
            None => {
                return Err(ClientError::SessionNegotiation {
                    status: 0,
                    body: "no negotiated session".to_string(),
                })
            },
        };

        self.state = SessionState::Connecting;

        let peer = PeerHandle::new(&self.settings.ice_servers).await?;
        // The peer is not stored until the handshake succeeds, so a failure
        // here must close it: close() cannot reach a connection it never
        // received.
        match self.wire(&peer, mic, &bearer).await {
            Ok(()) => {
                self.peer = Some(peer);
                self.state = SessionState::Connected;
                info!(session_id = ?self.session_id(), "realtime session connected");
                Ok(())
            },
            Err(e) => {
                peer.close().await;
                Err(e)
            },
        }
    }

    async fn wire(
        &self,
        peer: &PeerHandle,
        mic: MicrophoneTrack,
        bearer: &str,
    ) -> Result<(), ClientError> {
        peer.attach_microphone(mic).await?;
        peer.route_inbound_audio();
        if let Some(tx) = &self.transcript_tx {
            peer.relay_transcripts(tx.clone());
        }

        let offer = peer.offer().await?;
        let answer = self.negotiation.exchange_offer(&offer, bearer).await?;
        peer.apply_answer(answer).await?;
        Ok(())
    }

    /// Stream of transcript lines in arrival order.
    ///
    /// The underlying receiver moves into the first returned stream; later
    /// calls yield an empty stream. After `close` the stream drains any
    /// pending events and then ends.
    pub fn transcripts(&mut self) -> impl Stream<Item = String> {
        let rx = self.transcript_rx.take();
        if rx.is_none() {
            warn!("transcripts() called more than once; returning empty stream");
        }
        stream! {
            if let Some(mut rx) = rx {
                while let Some(text) = rx.recv().await {
                    yield text;
                }
            }
        }
    }

    /// Release the microphone and close the peer connection.
    ///
    /// Best-effort and idempotent: safe before `connect`, after a failed
    /// `connect`, and when called repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(peer) = self.peer.take() {
            peer.close().await;
        }
        // Dropping the sender lets the transcript stream end once drained.
        self.transcript_tx = None;
        self.state = SessionState::Closed;
    }
}
