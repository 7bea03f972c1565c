//! Peer connection wrapper
//!
//! Owns the `webrtc` peer connection and the tasks wired onto it: the
//! outbound microphone pump, one playback relay per inbound audio track, and
//! the control-channel transcript relay.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use voice_client_audio::Playback;
use voice_client_core::{transcript_text, Channels, SampleRate};

use crate::codec::{OpusDecoder, OpusEncoder};
use crate::mic::MicrophoneTrack;
use crate::TransportError;

/// Pipeline rate for both directions; the service negotiates Opus, which
/// carries its own rate on the wire.
const PIPELINE_RATE: SampleRate = SampleRate::Hz24000;

/// How long to wait for ICE gathering before sending the offer with
/// whatever candidates were found
const GATHER_TIMEOUT: Duration = Duration::from_secs(10);

fn opus_codec_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_OPUS.to_string(),
        clock_rate: 48000,
        channels: 2,
        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
        rtcp_feedback: vec![],
    }
}

fn create_api() -> Result<API, TransportError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: opus_codec_capability(),
                payload_type: 111,
                stats_id: String::new(),
            },
            RTPCodecType::Audio,
        )
        .map_err(|e| TransportError::Internal(e.to_string()))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| TransportError::Internal(e.to_string()))?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

/// Push a control-channel payload through the transcript parser, forwarding
/// the extracted text. Unrecognized or malformed payloads are dropped.
pub fn ingest_control(tx: &mpsc::UnboundedSender<String>, payload: &[u8]) {
    if let Some(text) = transcript_text(payload) {
        let _ = tx.send(text);
    }
}

/// Peer connection plus the relay tasks spawned onto it
pub struct PeerHandle {
    pc: Arc<RTCPeerConnection>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PeerHandle {
    /// Create the peer connection
    pub async fn new(ice_urls: &[String]) -> Result<Self, TransportError> {
        let api = create_api()?;

        let ice_servers = if ice_urls.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: ice_urls.to_vec(),
                ..Default::default()
            }]
        };

        let pc = api
            .new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let pc = Arc::new(pc);

        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            debug!(state = ?state, "peer connection state changed");
            Box::pin(async {})
        }));

        Ok(Self {
            pc,
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Attach the microphone adapter as the outbound media source.
    ///
    /// Spawns the pump that pulls frames from the adapter, Opus-encodes
    /// them, and writes them to the local track. The pump ends when capture
    /// stops (the adapter's queue closes) or the track rejects a sample.
    pub async fn attach_microphone(&self, mut mic: MicrophoneTrack) -> Result<(), TransportError> {
        let track = Arc::new(TrackLocalStaticSample::new(
            opus_codec_capability(),
            "audio".to_string(),
            "voice-client".to_string(),
        ));

        self.pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| TransportError::Media(e.to_string()))?;

        let encoder = OpusEncoder::new(mic.sample_rate(), Channels::Mono)?;

        let pump = tokio::spawn(async move {
            while let Some(frame) = mic.recv().await {
                let payload = match encoder.encode(&frame.samples) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("opus encode failed: {}", e);
                        continue;
                    },
                };
                let sample = Sample {
                    data: Bytes::from(payload),
                    duration: frame.duration(),
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    debug!("outbound track closed: {}", e);
                    break;
                }
            }
            debug!("microphone pump finished");
        });
        self.tasks.lock().push(pump);

        Ok(())
    }

    /// Register the inbound-media handler.
    ///
    /// Every remote audio track gets an independent relay task and playback
    /// stream; the playback device is opened lazily by the playback thread
    /// once the first decoded frame fixes the format. A relay ending (track
    /// end-of-stream or decode channel closing) releases only its own
    /// stream.
    pub fn route_inbound_audio(&self) {
        let tasks = Arc::clone(&self.tasks);
        self.pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            if track.kind() != RTPCodecType::Audio {
                return Box::pin(async {});
            }
            info!(ssrc = track.ssrc(), "inbound audio track arrived");

            let relay = tokio::spawn(relay_track(track));
            tasks.lock().push(relay);
            Box::pin(async {})
        }));
    }

    /// Register the control-channel handler, relaying transcript events
    /// onto `tx` in receipt order
    pub fn relay_transcripts(&self, tx: mpsc::UnboundedSender<String>) {
        self.pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            debug!(label = %channel.label(), "control channel arrived");
            let tx = tx.clone();
            Box::pin(async move {
                let tx = tx.clone();
                channel.on_message(Box::new(move |message| {
                    ingest_control(&tx, &message.data);
                    Box::pin(async {})
                }));
            })
        }));
    }

    /// Create the local offer and return its SDP once ICE gathering settles
    pub async fn offer(&self) -> Result<String, TransportError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let mut gather_complete = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if tokio::time::timeout(GATHER_TIMEOUT, gather_complete.recv())
            .await
            .is_err()
        {
            warn!("ICE gathering timed out, sending offer with partial candidates");
        }

        self.pc
            .local_description()
            .await
            .map(|description| description.sdp)
            .ok_or_else(|| TransportError::Internal("no local description".to_string()))
    }

    /// Apply the remote SDP answer
    pub async fn apply_answer(&self, sdp: String) -> Result<(), TransportError> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))
    }

    /// Tear down relay tasks and close the connection. Best-effort: a
    /// failing step never prevents the remaining steps from running.
    pub async fn close(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Err(e) = self.pc.close().await {
            debug!("peer connection close: {}", e);
        }
    }
}

/// Pull RTP from one inbound track, decode, and feed the playback thread
/// until the track signals end-of-stream.
async fn relay_track(track: Arc<TrackRemote>) {
    let decoder = match OpusDecoder::new(PIPELINE_RATE, Channels::Mono) {
        Ok(decoder) => decoder,
        Err(e) => {
            warn!("inbound decoder init failed: {}", e);
            return;
        },
    };
    let playback = Playback::spawn();

    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => {
                if packet.payload.is_empty() {
                    continue;
                }
                let samples = match decoder.decode(&packet.payload) {
                    Ok(samples) => samples,
                    Err(e) => {
                        warn!("opus decode error: {}", e);
                        match decoder.decode_plc() {
                            Ok(samples) => samples,
                            Err(_) => continue,
                        }
                    },
                };
                playback.write(
                    samples,
                    Channels::Mono.count() as u16,
                    PIPELINE_RATE.as_u32(),
                );
            },
            Err(e) => {
                debug!("inbound track ended: {}", e);
                break;
            },
        }
    }

    playback.stop();
}

/// Answer an SDP offer with a local receive-only peer.
///
/// Used by loopback tests and demos that need a structurally valid answer
/// without a remote service.
pub async fn answer_offer(offer_sdp: &str) -> Result<String, TransportError> {
    let api = create_api()?;
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let offer = RTCSessionDescription::offer(offer_sdp.to_string())
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    pc.set_remote_description(offer)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let answer = pc
        .create_answer(None)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let mut gather_complete = pc.gathering_complete_promise().await;
    pc.set_local_description(answer)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    let _ = tokio::time::timeout(GATHER_TIMEOUT, gather_complete.recv()).await;

    let sdp = pc
        .local_description()
        .await
        .map(|description| description.sdp)
        .ok_or_else(|| TransportError::Internal("no local description".to_string()))?;

    let _ = pc.close().await;
    Ok(sdp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_control_forwards_text_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        ingest_control(&tx, br#"{"type":"text","text":{"value":"hello"}}"#);
        ingest_control(&tx, br#"{"type":"other"}"#);
        ingest_control(&tx, b"not json");

        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ingest_control_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        ingest_control(&tx, br#"{"type":"text","text":{"value":"a"}}"#);
        ingest_control(&tx, br#"{"type":"text","text":{"value":"b"}}"#);

        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
    }

    #[tokio::test]
    async fn test_peer_handle_creation_and_close() {
        let peer = PeerHandle::new(&[]).await.unwrap();
        peer.close().await;
    }

    #[tokio::test]
    async fn test_offer_answer_loopback() {
        let peer = PeerHandle::new(&[]).await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        drop(tx); // pump exits immediately, no device involved
        let mic = MicrophoneTrack::from_receiver(rx, SampleRate::Hz24000);
        peer.attach_microphone(mic).await.unwrap();

        let offer = peer.offer().await.unwrap();
        assert!(offer.contains("m=audio"));

        let answer = answer_offer(&offer).await.unwrap();
        peer.apply_answer(answer).await.unwrap();

        peer.close().await;
    }
}
