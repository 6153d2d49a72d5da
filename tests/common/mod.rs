#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode as HttpStatus, Uri};
use axum::response::IntoResponse;
use axum::Router;
use avatar_stream_lib::config::AvatarProfile;
use avatar_stream_lib::logger::{EventSink, SessionEvent};
use avatar_stream_lib::peer::{
    IceCandidate, IceServer, IceUrls, NegotiationData, NegotiationError, PeerTransport,
    SessionDescription, SessionId, StreamSession, TransportEvent, TransportEvents,
    TransportFactory, WebrtcData,
};
use avatar_stream_lib::signaling::{HttpSignalingClient, SignalingApi, SignalingError};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;

pub const OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 2 2 IN IP4 0.0.0.0\r\ns=-\r\n";

pub fn ice_servers() -> Vec<IceServer> {
    vec![IceServer {
        urls: IceUrls::One("turn:relay.example:3478".into()),
        username: Some("user".into()),
        credential: Some("secret".into()),
    }]
}

pub fn negotiation_data() -> NegotiationData {
    NegotiationData {
        offer: SessionDescription::offer(OFFER_SDP),
        ice_servers: ice_servers(),
    }
}

pub fn stream_session(id: &str) -> StreamSession {
    StreamSession {
        id: Some(SessionId::new(id)),
        webrtc_data: Some(WebrtcData {
            offer: Some(SessionDescription::offer(OFFER_SDP)),
            ice_servers: Some(ice_servers()),
        }),
    }
}

pub fn bare_session(id: &str) -> StreamSession {
    StreamSession {
        id: Some(SessionId::new(id)),
        webrtc_data: None,
    }
}

pub fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 16777215 203.0.113.{n} 5{n:04} typ relay"),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        username_fragment: Some("ufrag".into()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(AvatarProfile),
    Get(SessionId),
    Finalize(SessionId, SessionDescription),
    Candidate(SessionId, IceCandidate),
    Render(SessionId, String),
    Interrupt(SessionId),
    Delete(SessionId),
}

/// Scripted signaling service that records every call
#[derive(Default)]
pub struct FakeSignaling {
    calls: Mutex<Vec<Call>>,
    create_response: Mutex<StreamSession>,
    get_response: Mutex<Option<StreamSession>>,
    pub fail_delete: AtomicBool,
    pub fail_candidates: AtomicBool,
    pub fail_finalize: AtomicBool,
}

impl FakeSignaling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, session: StreamSession) -> Self {
        *self.create_response.lock().unwrap() = session;
        self
    }

    pub fn on_get(self, session: Option<StreamSession>) -> Self {
        *self.get_response.lock().unwrap() = session;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Candidate(_, candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn rejected() -> SignalingError {
        SignalingError::Rejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        }
    }
}

#[async_trait]
impl SignalingApi for FakeSignaling {
    async fn create_session(
        &self,
        profile: &AvatarProfile,
    ) -> Result<StreamSession, SignalingError> {
        self.record(Call::Create(profile.clone()));
        Ok(self.create_response.lock().unwrap().clone())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<StreamSession>, SignalingError> {
        self.record(Call::Get(id.clone()));
        Ok(self.get_response.lock().unwrap().clone())
    }

    async fn finalize_negotiation(
        &self,
        id: &SessionId,
        answer: &SessionDescription,
    ) -> Result<(), SignalingError> {
        self.record(Call::Finalize(id.clone(), answer.clone()));
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(())
    }

    async fn submit_candidate(
        &self,
        id: &SessionId,
        candidate: &IceCandidate,
    ) -> Result<(), SignalingError> {
        self.record(Call::Candidate(id.clone(), candidate.clone()));
        if self.fail_candidates.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(())
    }

    async fn render_text(&self, id: &SessionId, text: &str) -> Result<(), SignalingError> {
        self.record(Call::Render(id.clone(), text.to_string()));
        Ok(())
    }

    async fn interrupt(&self, id: &SessionId) -> Result<(), SignalingError> {
        self.record(Call::Interrupt(id.clone()));
        Ok(())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), SignalingError> {
        self.record(Call::Delete(id.clone()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(())
    }
}

#[derive(Default)]
struct TransportProbe {
    remote: Mutex<Vec<SessionDescription>>,
    local: Mutex<Vec<SessionDescription>>,
    closed: AtomicUsize,
}

pub struct FakeTransport {
    probe: Arc<TransportProbe>,
    tx: mpsc::UnboundedSender<TransportEvent>,
    early_candidates: u16,
    fail_remote: bool,
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn set_remote_description(
        &self,
        offer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.fail_remote {
            return Err(NegotiationError::Transport("offer rejected".into()));
        }
        self.probe.remote.lock().unwrap().push(offer.clone());
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        Ok(SessionDescription::answer(ANSWER_SDP))
    }

    async fn set_local_description(
        &self,
        answer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.probe.local.lock().unwrap().push(answer.clone());
        // gathering starts as soon as the local description is applied
        for n in 0..self.early_candidates {
            let _ = self
                .tx
                .send(TransportEvent::Candidate(Some(candidate(100 + n))));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fake transports and keeps a sender to inject their events
#[derive(Default)]
pub struct FakeTransportFactory {
    probes: Mutex<Vec<Arc<TransportProbe>>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    ice_servers: Mutex<Vec<Vec<IceServer>>>,
    early_candidates: u16,
    fail_remote: bool,
}

impl FakeTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each transport reports `n` candidates while the answer is being sent
    pub fn with_early_candidates(mut self, n: u16) -> Self {
        self.early_candidates = n;
        self
    }

    pub fn rejecting_offers(mut self) -> Self {
        self.fail_remote = true;
        self
    }

    pub fn created(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn closed(&self, index: usize) -> usize {
        self.probes.lock().unwrap()[index].closed.load(Ordering::SeqCst)
    }

    pub fn remote_descriptions(&self, index: usize) -> Vec<SessionDescription> {
        self.probes.lock().unwrap()[index].remote.lock().unwrap().clone()
    }

    pub fn local_descriptions(&self, index: usize) -> Vec<SessionDescription> {
        self.probes.lock().unwrap()[index].local.lock().unwrap().clone()
    }

    pub fn ice_servers(&self, index: usize) -> Vec<IceServer> {
        self.ice_servers.lock().unwrap()[index].clone()
    }

    /// Sender for the most recently created transport
    pub fn sender(&self) -> mpsc::UnboundedSender<TransportEvent> {
        self.senders
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport created")
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<(Box<dyn PeerTransport>, TransportEvents), NegotiationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(TransportProbe::default());
        self.probes.lock().unwrap().push(probe.clone());
        self.senders.lock().unwrap().push(tx.clone());
        self.ice_servers.lock().unwrap().push(ice_servers.to_vec());
        Ok((
            Box::new(FakeTransport {
                probe,
                tx,
                early_candidates: self.early_candidates,
                fail_remote: self.fail_remote,
            }),
            rx,
        ))
    }
}

/// Collects every emitted session event
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub auth: Option<String>,
    pub body: Value,
}

/// Records every request; replies with a scripted status/body per `METHOD path`
#[derive(Default)]
pub struct FakeService {
    requests: Mutex<Vec<Recorded>>,
    replies: Mutex<HashMap<String, (HttpStatus, String)>>,
}

impl FakeService {
    pub fn reply(&self, route: &str, status: HttpStatus, body: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .insert(route.to_string(), (status, body.into()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().last().cloned().expect("no request recorded")
    }
}

async fn record(
    State(service): State<Arc<FakeService>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_string();
    let route = format!("{method} {path}");
    service.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path,
        auth: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    let (status, body) = service
        .replies
        .lock()
        .unwrap()
        .get(&route)
        .cloned()
        .unwrap_or((HttpStatus::OK, "{}".to_string()));
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

pub async fn spawn_service() -> (Arc<FakeService>, HttpSignalingClient, Arc<RecordingEvents>) {
    let service = Arc::new(FakeService::default());
    let router = Router::new().fallback(record).with_state(service.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake service");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    let events = Arc::new(RecordingEvents::default());
    let base = Url::parse(&format!("http://{addr}/api/v1/")).unwrap();
    let client = HttpSignalingClient::new(base, Some("test-key".into()), None, events.clone())
        .expect("client");
    (service, client, events)
}

pub fn session_json(id: &str) -> String {
    json!({
        "id": id,
        "webrtcData": {
            "offer": { "type": "offer", "sdp": OFFER_SDP },
            "iceServers": [
                { "urls": ["turn:relay.example:3478"], "username": "user", "credential": "secret" }
            ]
        }
    })
    .to_string()
}
