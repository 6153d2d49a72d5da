use crate::config::AvatarProfile;
use crate::logger::EventSink;
use crate::peer::{NegotiationEngine, NegotiationError, PlaybackSink, SessionId, TransportFactory};
use crate::session::{SessionStore, StoreError};
use crate::signaling::{SignalingApi, SignalingError};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}

/// How a `start` attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Answer sent; candidates are trickling on the live engine
    Negotiating { session_id: SessionId, resumed: bool },
    /// The persisted stream is gone on the service side; the id was cleared
    Expired,
    /// The stream carried no offer/ice-server data; the id was cleared
    MissingNegotiationData,
}

/// Start/close/render/interrupt over a single persisted stream
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    signaling: Arc<dyn SignalingApi>,
    factory: Arc<dyn TransportFactory>,
    sink: Arc<dyn PlaybackSink>,
    events: Arc<dyn EventSink>,
    profile: AvatarProfile,
    engine: Option<NegotiationEngine>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        signaling: Arc<dyn SignalingApi>,
        factory: Arc<dyn TransportFactory>,
        sink: Arc<dyn PlaybackSink>,
        events: Arc<dyn EventSink>,
        profile: AvatarProfile,
    ) -> Self {
        Self {
            store,
            signaling,
            factory,
            sink,
            events,
            profile,
            engine: None,
        }
    }

    pub fn engine(&self) -> Option<&NegotiationEngine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut NegotiationEngine> {
        self.engine.as_mut()
    }

    pub fn current_session(&self) -> Result<Option<SessionId>, ControllerError> {
        Ok(self.store.get()?)
    }

    pub async fn start(&mut self) -> Result<StartOutcome, ControllerError> {
        // at most one live transport
        if let Some(mut previous) = self.engine.take() {
            previous.close().await;
        }

        let (session_id, session, resumed) = match self.store.get()? {
            Some(id) => match self.signaling.get_session(&id).await? {
                Some(session) => {
                    let current = session.id.clone().unwrap_or_else(|| id.clone());
                    if current != id {
                        self.store.set(&current)?;
                    }
                    info!(session_id = %current, "resuming persisted stream");
                    (current, session, true)
                }
                None => {
                    info!(session_id = %id, "persisted stream expired");
                    self.store.clear()?;
                    return Ok(StartOutcome::Expired);
                }
            },
            None => {
                let session = self.signaling.create_session(&self.profile).await?;
                let Some(id) = session.id.clone() else {
                    return Err(SignalingError::InvalidResponse(
                        "created stream has no id".into(),
                    )
                    .into());
                };
                self.store.set(&id)?;
                info!(session_id = %id, avatar = %self.profile.avatar_code, "created stream");
                (id, session, false)
            }
        };

        let Some(data) = session.negotiation() else {
            info!(session_id = %session_id, "stream has no negotiation data, start over");
            self.store.clear()?;
            return Ok(StartOutcome::MissingNegotiationData);
        };

        let mut engine = NegotiationEngine::new(
            session_id.clone(),
            self.signaling.clone(),
            self.sink.clone(),
            self.events.clone(),
        );
        if let Err(err) = engine.setup(self.factory.as_ref(), data).await {
            // nothing valid to delete remotely
            self.store.clear()?;
            return Err(err.into());
        }
        self.engine = Some(engine);
        Ok(StartOutcome::Negotiating {
            session_id,
            resumed,
        })
    }

    /// Handles one transport event; `false` when no live engine remains
    pub async fn pump(&mut self) -> bool {
        match self.engine.as_mut() {
            Some(engine) => engine.pump().await,
            None => false,
        }
    }

    /// Drops the local transport but keeps the stream persisted for a later resume
    pub async fn suspend(&mut self) {
        self.sink.detach();
        if let Some(mut engine) = self.engine.take() {
            engine.close().await;
        }
    }

    pub async fn close(&mut self) -> Result<(), ControllerError> {
        self.sink.detach();
        if let Some(mut engine) = self.engine.take() {
            engine.close().await;
        }

        let Some(id) = self.store.get()? else {
            debug!("close without a persisted stream");
            return Ok(());
        };
        if let Err(err) = self.signaling.delete_session(&id).await {
            warn!(session_id = %id, error = %err, "remote delete failed; forgetting stream anyway");
        }
        self.store.clear()?;
        info!(session_id = %id, "stream closed");
        Ok(())
    }

    /// Returns `false` when there is no stream to narrate on
    pub async fn render_text(&self, text: &str) -> Result<bool, ControllerError> {
        let Some(id) = self.store.get()? else {
            debug!("render requested without a persisted stream");
            return Ok(false);
        };
        self.signaling.render_text(&id, text).await?;
        info!(session_id = %id, chars = text.chars().count(), "render requested");
        Ok(true)
    }

    pub async fn interrupt(&self) -> Result<bool, ControllerError> {
        let Some(id) = self.store.get()? else {
            debug!("interrupt requested without a persisted stream");
            return Ok(false);
        };
        self.signaling.interrupt(&id).await?;
        info!(session_id = %id, "interrupt requested");
        Ok(true)
    }
}
