use crate::peer::types::IceCandidate;
use clap::ValueEnum;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const FILTER_ENV: &str = "AVATAR_STREAM_LOG";
const NOISY_TARGETS: &[&str] = &[
    "webrtc",
    "webrtc_ice",
    "webrtc_dtls",
    "webrtc_srtp",
    "webrtc_sctp",
    "webrtc_mdns",
    "turn",
    "stun",
    "interceptor",
];

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    // debug builds log more, release builds only warnings
    fn default() -> Self {
        if crate::config::LOGGING_VERBOSE {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber. Repeated calls are no-ops.
pub fn init(level: LogLevel) -> Result<(), InitError> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(level >= LogLevel::Debug)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;
    INIT.set(()).ok();
    Ok(())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = std::env::var(FILTER_ENV) {
        return EnvFilter::new(filter);
    }
    EnvFilter::new(default_filter(level))
}

fn default_filter(level: LogLevel) -> String {
    let base = level.to_filter().to_string().to_lowercase();
    if level >= LogLevel::Trace {
        return base;
    }
    let mut directives = vec![base];
    directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Dumps a local candidate as soon as it is gathered
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    debug!(
        label,
        candidate = %cand.candidate,
        sdp_mid = ?cand.sdp_mid,
        sdp_mline_index = ?cand.sdp_mline_index,
        "trickle candidate"
    );
}

/// Events surfaced to whoever drives the session (UI, CLI, tests)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Human-readable message from the remote service
    Message(String),
    Negotiating,
    Connected,
    ConnectionProblem,
    Disconnected,
    PlaybackStarted,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Prints service messages to stderr and logs state changes
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEvents;

impl EventSink for ConsoleEvents {
    fn emit(&self, event: SessionEvent) {
        match event {
            SessionEvent::Message(msg) => {
                warn!(message = %msg, "service message");
                eprintln!("{msg}");
            }
            SessionEvent::ConnectionProblem => warn!("connection problem detected"),
            other => info!(event = ?other, "session event"),
        }
    }
}
