pub mod connection;
pub mod engine;
pub mod ice;
pub mod playback;
pub mod state;
pub mod types;

use crate::signaling::SignalingError;

pub use connection::{
    ConnectionState, GatheringState, PeerTransport, RtcTransport, RtcTransportFactory,
    TransportEvent, TransportEvents, TransportFactory,
};
pub use engine::NegotiationEngine;
pub use playback::{PlaybackSink, RtpPlaybackSink};
pub use state::NegotiationState;
pub use types::{
    IceCandidate, IceServer, IceUrls, MediaStream, NegotiationData, SdpKind, SessionDescription,
    SessionId, StreamSession, WebrtcData,
};

#[derive(thiserror::Error, Debug)]
pub enum NegotiationError {
    #[error("webrtc error: {0}")]
    Rtc(#[from] webrtc::Error),
    #[error("signaling failed during negotiation: {0}")]
    Signaling(#[from] SignalingError),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: NegotiationState,
        action: &'static str,
    },
    #[error("unexpected {0:?} description")]
    UnexpectedDescription(SdpKind),
    #[error("transport failure: {0}")]
    Transport(String),
}
