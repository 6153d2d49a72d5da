use crate::peer::types::{IceCandidate, IceServer, MediaStream, SdpKind, SessionDescription};
use crate::peer::NegotiationError;
use crate::utils::to_rtc_ice_servers;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything the transport reports asynchronously, in arrival order
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// `None` is the end-of-candidates marker
    Candidate(Option<IceCandidate>),
    GatheringState(GatheringState),
    StreamAdded(Arc<MediaStream>),
    ConnectionState(ConnectionState),
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Peer connection as seen by the negotiation engine
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn set_remote_description(&self, offer: &SessionDescription)
        -> Result<(), NegotiationError>;
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn set_local_description(&self, answer: &SessionDescription)
        -> Result<(), NegotiationError>;
    async fn close(&self) -> Result<(), NegotiationError>;
}

/// Builds one fresh relay-only transport per negotiation attempt
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<(Box<dyn PeerTransport>, TransportEvents), NegotiationError>;
}

/// Peer connection config that only gathers relay candidates
pub fn rtc_config(ice_servers: &[IceServer]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: to_rtc_ice_servers(ice_servers),
        ice_transport_policy: RTCIceTransportPolicy::Relay,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<(Box<dyn PeerTransport>, TransportEvents), NegotiationError> {
        let (transport, events) = RtcTransport::new(ice_servers).await?;
        Ok((Box::new(transport), events))
    }
}

/// `webrtc` peer connection whose callbacks feed a single event channel
pub struct RtcTransport {
    pc: Arc<RTCPeerConnection>,
}

impl RtcTransport {
    pub async fn new(ice_servers: &[IceServer]) -> Result<(Self, TransportEvents), NegotiationError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(ice_servers)).await?);
        info!(servers = ice_servers.len(), "peer connection created (relay only)");

        let (tx, rx) = mpsc::unbounded_channel();
        register_callbacks(&pc, tx);
        Ok((Self { pc }, rx))
    }
}

fn register_callbacks(pc: &Arc<RTCPeerConnection>, tx: mpsc::UnboundedSender<TransportEvent>) {
    // local candidates; None marks the end of gathering
    let cand_tx = tx.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let event = match cand {
            Some(c) => match c.to_json() {
                Ok(init) => Some(TransportEvent::Candidate(Some(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }))),
                Err(err) => {
                    warn!(error = %err, "failed to serialize local candidate");
                    None
                }
            },
            None => Some(TransportEvent::Candidate(None)),
        };
        if let Some(event) = event {
            let _ = cand_tx.send(event);
        }
        Box::pin(async {})
    }));

    let gather_tx = tx.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        debug!(?state, "ice gathering state changed");
        let mapped = match state {
            RTCIceGathererState::Gathering => Some(GatheringState::Gathering),
            RTCIceGathererState::Complete => Some(GatheringState::Complete),
            RTCIceGathererState::New => Some(GatheringState::New),
            _ => None,
        };
        if let Some(mapped) = mapped {
            let _ = gather_tx.send(TransportEvent::GatheringState(mapped));
        }
        Box::pin(async {})
    }));

    // tracks are grouped by stream id, like a browser MediaStream
    let streams: Arc<Mutex<HashMap<String, Arc<MediaStream>>>> = Arc::default();
    let track_tx = tx.clone();
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _tr: Arc<RTCRtpTransceiver>| {
            let stream_id = track.stream_id();
            debug!(stream = %stream_id, track = %track.id(), kind = ?track.kind(), "remote track added");
            let stream = {
                let mut streams = streams.lock();
                streams
                    .entry(stream_id.clone())
                    .or_insert_with(|| Arc::new(MediaStream::new(stream_id)))
                    .clone()
            };
            stream.add_track(track);
            let _ = track_tx.send(TransportEvent::StreamAdded(stream));
            Box::pin(async {})
        },
    ));

    let state_tx = tx;
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!(state = ?st, "peer connection state changed");
        let mapped = match st {
            RTCPeerConnectionState::New => Some(ConnectionState::New),
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            _ => None,
        };
        if let Some(mapped) = mapped {
            let _ = state_tx.send(TransportEvent::ConnectionState(mapped));
        }
        Box::pin(async {})
    }));
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn set_remote_description(
        &self,
        offer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        if offer.kind != SdpKind::Offer {
            return Err(NegotiationError::UnexpectedDescription(offer.kind));
        }
        let desc = RTCSessionDescription::offer(offer.sdp.clone())?;
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        answer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        if answer.kind != SdpKind::Answer {
            return Err(NegotiationError::UnexpectedDescription(answer.kind));
        }
        let desc = RTCSessionDescription::answer(answer.sdp.clone())?;
        self.pc.set_local_description(desc).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.pc.close().await?;
        Ok(())
    }
}
