use crate::config::AvatarProfile;
use crate::logger::{EventSink, SessionEvent};
use crate::peer::types::{IceCandidate, SessionDescription, SessionId, StreamSession};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum SignalingError {
    #[error("invalid signaling endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Remote session lifecycle operations. Each call is attempted exactly once.
#[async_trait]
pub trait SignalingApi: Send + Sync {
    async fn create_session(&self, profile: &AvatarProfile)
        -> Result<StreamSession, SignalingError>;

    /// `None` when the service no longer knows the session
    async fn get_session(&self, id: &SessionId) -> Result<Option<StreamSession>, SignalingError>;

    async fn finalize_negotiation(
        &self,
        id: &SessionId,
        answer: &SessionDescription,
    ) -> Result<(), SignalingError>;

    async fn submit_candidate(
        &self,
        id: &SessionId,
        candidate: &IceCandidate,
    ) -> Result<(), SignalingError>;

    async fn render_text(&self, id: &SessionId, text: &str) -> Result<(), SignalingError>;

    async fn interrupt(&self, id: &SessionId) -> Result<(), SignalingError>;

    async fn delete_session(&self, id: &SessionId) -> Result<(), SignalingError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStreamRequest<'a> {
    avatar_code: &'a str,
    voice_id: &'a str,
    voice_provider: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    answer: &'a SessionDescription,
}

#[derive(Debug, Serialize)]
struct CandidateRequest<'a> {
    candidate: &'a IceCandidate,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    text: &'a str,
}

struct ApiResponse {
    status: StatusCode,
    body: Value,
}

impl ApiResponse {
    fn message(&self) -> Option<String> {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn ensure_success(self) -> Result<Value, SignalingError> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(SignalingError::Rejected {
                status: self.status,
                message: self.message(),
            })
        }
    }
}

/// `SignalingApi` over the service's JSON HTTP surface
pub struct HttpSignalingClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    events: Arc<dyn EventSink>,
}

impl HttpSignalingClient {
    pub fn new(
        base_url: Url,
        api_key: Option<String>,
        request_timeout: Option<Duration>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, SignalingError> {
        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url,
            api_key,
            events,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends each segment percent-encoded, so an id can never escape its path slot
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SignalingError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SignalingError::InvalidEndpoint(format!("{} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<ApiResponse, SignalingError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        debug!(%method, %url, "signaling request");

        let mut builder = self.client.request(method.clone(), url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder = match body {
            Some(body) => builder.json(body),
            None => builder.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        let response = ApiResponse { status, body };

        if !status.is_success() {
            match response.message() {
                Some(message) => {
                    warn!(%method, %path, %status, message = %message, "signaling request rejected");
                    self.events.emit(SessionEvent::Message(message));
                }
                None => warn!(%method, %path, %status, "signaling request failed"),
            }
        }
        Ok(response)
    }

    fn parse_session(body: Value) -> Result<StreamSession, SignalingError> {
        serde_json::from_value(body)
            .map_err(|err| SignalingError::InvalidResponse(format!("stream payload: {err}")))
    }
}

#[async_trait]
impl SignalingApi for HttpSignalingClient {
    async fn create_session(
        &self,
        profile: &AvatarProfile,
    ) -> Result<StreamSession, SignalingError> {
        let request = CreateStreamRequest {
            avatar_code: &profile.avatar_code,
            voice_id: &profile.voice_id,
            voice_provider: &profile.voice_provider,
        };
        let body = self
            .request(Method::POST, &["streams"], Some(&request))
            .await?
            .ensure_success()?;
        Self::parse_session(body)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<StreamSession>, SignalingError> {
        let response = self
            .request::<()>(Method::GET, &["streams", id.as_str()], None)
            .await?;
        let status = response.status;
        if !status.is_success() && !response.body.is_object() {
            return Err(SignalingError::Rejected {
                status,
                message: None,
            });
        }
        // An expired stream is reported by the payload missing its id, not by the status.
        let session = match Self::parse_session(response.body) {
            Ok(session) => session,
            Err(_) if !status.is_success() => StreamSession::default(),
            Err(err) => return Err(err),
        };
        if session.id.is_none() {
            debug!(session_id = %id, %status, "stream no longer known to the service");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SignalingError::Rejected {
                status,
                message: None,
            });
        }
        Ok(Some(session))
    }

    async fn finalize_negotiation(
        &self,
        id: &SessionId,
        answer: &SessionDescription,
    ) -> Result<(), SignalingError> {
        self.request(
            Method::PUT,
            &["streams", id.as_str()],
            Some(&AnswerRequest { answer }),
        )
        .await?
        .ensure_success()
        .map(drop)
    }

    async fn submit_candidate(
        &self,
        id: &SessionId,
        candidate: &IceCandidate,
    ) -> Result<(), SignalingError> {
        self.request(
            Method::POST,
            &["streams", "candidate", id.as_str()],
            Some(&CandidateRequest { candidate }),
        )
        .await?
        .ensure_success()
        .map(drop)
    }

    async fn render_text(&self, id: &SessionId, text: &str) -> Result<(), SignalingError> {
        self.request(
            Method::POST,
            &["streams", "render", id.as_str()],
            Some(&RenderRequest { text }),
        )
        .await?
        .ensure_success()
        .map(drop)
    }

    async fn interrupt(&self, id: &SessionId) -> Result<(), SignalingError> {
        self.request::<()>(Method::DELETE, &["streams", "render", id.as_str()], None)
            .await?
            .ensure_success()
            .map(drop)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), SignalingError> {
        self.request::<()>(Method::DELETE, &["streams", id.as_str()], None)
            .await?
            .ensure_success()
            .map(drop)
    }
}
