use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Opaque identifier of a remote streaming session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session description as exchanged with the remote service (`{type, sdp}`)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Local ICE candidate in the browser `RTCIceCandidateInit` shape
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// `urls` may arrive either as a single string or as a list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

impl IceUrls {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            IceUrls::One(url) => vec![url.clone()],
            IceUrls::Many(urls) => urls.clone(),
        }
    }
}

/// Relay/connectivity server descriptor supplied alongside the offer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebrtcData {
    #[serde(default)]
    pub offer: Option<SessionDescription>,
    #[serde(default)]
    pub ice_servers: Option<Vec<IceServer>>,
}

/// Offer plus ice-server config; both are required before a transport is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationData {
    pub offer: SessionDescription,
    pub ice_servers: Vec<IceServer>,
}

/// Stream payload returned by create/fetch. Unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    #[serde(default)]
    pub id: Option<SessionId>,
    /// Malformed negotiation data reads as absent so the id is never lost with it
    #[serde(default, deserialize_with = "lenient")]
    pub webrtc_data: Option<WebrtcData>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unusable negotiation data");
            Ok(None)
        }
    }
}

impl StreamSession {
    pub fn negotiation(&self) -> Option<NegotiationData> {
        let data = self.webrtc_data.as_ref()?;
        let offer = data.offer.clone()?;
        if offer.kind != SdpKind::Offer {
            return None;
        }
        Some(NegotiationData {
            offer,
            ice_servers: data.ice_servers.clone()?,
        })
    }
}

/// Inbound media stream: remote tracks grouped by their stream id
pub struct MediaStream {
    id: String,
    tracks: Mutex<Vec<Arc<TrackRemote>>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_track(&self, track: Arc<TrackRemote>) {
        self.tracks.lock().push(track);
    }

    pub fn tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.tracks.lock().clone()
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.lock().len())
            .finish()
    }
}
