//! Offer/answer exchange and candidate trickling for one session attempt.
//!
//! The engine owns the transport and its event channel. Transport callbacks
//! only enqueue events; every state change happens in [`NegotiationEngine::handle_event`]
//! on the task that drives the engine, so no two handlers ever run at once.

use crate::logger::{dump_candidate, EventSink, SessionEvent};
use crate::peer::connection::{
    ConnectionState, GatheringState, PeerTransport, TransportEvent, TransportEvents,
    TransportFactory,
};
use crate::peer::ice::CandidateTally;
use crate::peer::playback::PlaybackSink;
use crate::peer::state::NegotiationState;
use crate::peer::types::{IceCandidate, MediaStream, NegotiationData, SessionId};
use crate::peer::NegotiationError;
use crate::signaling::SignalingApi;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct NegotiationEngine {
    session_id: SessionId,
    state: NegotiationState,
    transport: Option<Box<dyn PeerTransport>>,
    events: Option<TransportEvents>,
    signaling: Arc<dyn SignalingApi>,
    sink: Arc<dyn PlaybackSink>,
    notifier: Arc<dyn EventSink>,
    stream: Option<Arc<MediaStream>>,
    gathering_complete: bool,
    tally: CandidateTally,
    submissions: JoinSet<()>,
}

impl NegotiationEngine {
    pub fn new(
        session_id: SessionId,
        signaling: Arc<dyn SignalingApi>,
        sink: Arc<dyn PlaybackSink>,
        notifier: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            session_id,
            state: NegotiationState::Idle,
            transport: None,
            events: None,
            signaling,
            sink,
            notifier,
            stream: None,
            gathering_complete: false,
            tally: CandidateTally::default(),
            submissions: JoinSet::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn candidate_tally(&self) -> CandidateTally {
        self.tally
    }

    fn transition(&mut self, next: NegotiationState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "ignoring illegal transition");
            return false;
        }
        debug!(session_id = %self.session_id, from = %self.state, to = %next, "negotiation state");
        self.state = next;
        true
    }

    fn advance(
        &mut self,
        next: NegotiationState,
        action: &'static str,
    ) -> Result<(), NegotiationError> {
        if self.transition(next) {
            Ok(())
        } else {
            Err(NegotiationError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    /// Builds the relay-only transport, applies the offer, and sends the answer.
    ///
    /// On any failure the engine ends up `Closed` with its transport released.
    pub async fn setup(
        &mut self,
        factory: &dyn TransportFactory,
        data: NegotiationData,
    ) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::InvalidTransition {
                state: self.state,
                action: "set up negotiation",
            });
        }
        match self.run_setup(factory, data).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(session_id = %self.session_id, state = %self.state, error = %err, "negotiation setup failed");
                self.shutdown().await;
                Err(err)
            }
        }
    }

    async fn run_setup(
        &mut self,
        factory: &dyn TransportFactory,
        data: NegotiationData,
    ) -> Result<(), NegotiationError> {
        self.advance(NegotiationState::AwaitingLocalAnswer, "build the transport")?;
        let (transport, events) = factory.create(&data.ice_servers).await?;
        self.events = Some(events);
        let transport = self.transport.insert(transport);

        transport.set_remote_description(&data.offer).await?;
        let answer = transport.create_answer().await?;
        transport.set_local_description(&answer).await?;

        self.signaling
            .finalize_negotiation(&self.session_id, &answer)
            .await?;
        self.advance(NegotiationState::Negotiating, "start trickling")?;
        self.notifier.emit(SessionEvent::Negotiating);
        info!(session_id = %self.session_id, "answer sent, trickling candidates");
        Ok(())
    }

    /// Waits for the next transport event; `None` once closed or the transport is gone
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.state.is_closed() {
            return None;
        }
        self.events.as_mut()?.recv().await
    }

    /// Receives and handles one event. Returns `false` when nothing more will arrive.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Candidate(Some(candidate)) => self.on_candidate(candidate),
            TransportEvent::Candidate(None) => {
                // end of local candidates; never sent to the service
                debug!(session_id = %self.session_id, "end of local candidates");
            }
            TransportEvent::GatheringState(state) => self.on_gathering_state(state),
            TransportEvent::StreamAdded(stream) => self.on_stream(stream),
            TransportEvent::ConnectionState(state) => self.on_connection_state(state),
        }
    }

    fn on_candidate(&mut self, candidate: IceCandidate) {
        if !self.state.accepts_candidates() {
            debug!(state = %self.state, "dropping local candidate");
            return;
        }
        dump_candidate("LOCAL", &candidate);
        self.tally.record(&candidate);

        let signaling = self.signaling.clone();
        let session_id = self.session_id.clone();
        self.submissions.spawn(async move {
            if let Err(err) = signaling.submit_candidate(&session_id, &candidate).await {
                warn!(session_id = %session_id, error = %err, "candidate submission failed");
            }
        });
    }

    fn on_gathering_state(&mut self, state: GatheringState) {
        if state != GatheringState::Complete || self.gathering_complete {
            return;
        }
        if !self.transition(NegotiationState::Connected) {
            return;
        }
        self.gathering_complete = true;
        self.tally.report();
        self.try_play();
    }

    fn on_stream(&mut self, stream: Arc<MediaStream>) {
        if !self.state.accepts_streams() {
            debug!(state = %self.state, stream = %stream.id(), "ignoring remote stream");
            return;
        }
        self.sink.attach(Arc::downgrade(&stream));
        self.stream = Some(stream);
        self.try_play();
    }

    // Playback needs both a stream and completed gathering
    fn try_play(&mut self) {
        if !self.gathering_complete || self.stream.is_none() {
            return;
        }
        if self.sink.has_source() && self.sink.is_paused() && self.sink.play() {
            self.notifier.emit(SessionEvent::PlaybackStarted);
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        if self.state.is_closed() {
            return;
        }
        match state {
            ConnectionState::Connected => {
                info!(session_id = %self.session_id, "media transport connected");
                self.notifier.emit(SessionEvent::Connected);
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                warn!(session_id = %self.session_id, ?state, "media transport interrupted");
                self.notifier.emit(SessionEvent::ConnectionProblem);
            }
            ConnectionState::Closed => {
                self.notifier.emit(SessionEvent::Disconnected);
            }
            ConnectionState::New | ConnectionState::Connecting => {}
        }
    }

    /// Waits for every candidate submission spawned so far
    pub async fn flush_candidates(&mut self) {
        while let Some(result) = self.submissions.join_next().await {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!(error = %err, "candidate submission task panicked");
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        self.sink.detach();
        self.stream = None;
        self.events = None;
        if let Some(transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                debug!(error = %err, "closing transport failed");
            }
        }
        // In-flight submissions finish on their own; later candidates are dropped by state.
        self.submissions.detach_all();
        self.state = NegotiationState::Closed;
    }

    /// Detaches the sink and discards the transport. Remote deletion is the caller's job.
    pub async fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.shutdown().await;
        info!(session_id = %self.session_id, "negotiation closed");
    }
}
