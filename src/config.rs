// Application configuration.
// Verbose logging is on by default only in debug builds.

use crate::logger::LogLevel;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[cfg(debug_assertions)]
pub const LOGGING_VERBOSE: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_VERBOSE: bool = false;

pub const DEFAULT_API_BASE: &str = "https://apis.elai.io/api/v1/";
pub const DEFAULT_AVATAR: &str = "vadim";
pub const DEFAULT_VOICE: &str = "flq6f7yk4E4fJM5XTYuZ";
pub const DEFAULT_VOICE_PROVIDER: &str = "elevenlabs";

/// Avatar and voice used when creating a new stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarProfile {
    pub avatar_code: String,
    pub voice_id: String,
    pub voice_provider: String,
}

impl Default for AvatarProfile {
    fn default() -> Self {
        Self {
            avatar_code: DEFAULT_AVATAR.into(),
            voice_id: DEFAULT_VOICE.into(),
            voice_provider: DEFAULT_VOICE_PROVIDER.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid api base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("api base url cannot be empty")]
    EmptyBaseUrl,
}

/// Service settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Base URL of the streaming API
    #[arg(long, env = "AVATAR_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Bearer key for the streaming API
    #[arg(long, env = "AVATAR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "AVATAR_CODE", default_value = DEFAULT_AVATAR)]
    pub avatar: String,

    #[arg(long, env = "AVATAR_VOICE_ID", default_value = DEFAULT_VOICE)]
    pub voice_id: String,

    #[arg(long, env = "AVATAR_VOICE_PROVIDER", default_value = DEFAULT_VOICE_PROVIDER)]
    pub voice_provider: String,

    /// File holding the persisted stream id
    #[arg(long, env = "AVATAR_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Whole-request timeout in seconds; unset waits indefinitely
    #[arg(long, env = "AVATAR_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: Url,
    pub api_key: Option<String>,
    pub profile: AvatarProfile,
    pub session_file: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
    pub log_level: LogLevel,
}

impl Config {
    pub fn from_args(args: &ServiceArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: parse_api_base(&args.api_base)?,
            api_key: args
                .api_key
                .as_ref()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            profile: AvatarProfile {
                avatar_code: args.avatar.clone(),
                voice_id: args.voice_id.clone(),
                voice_provider: args.voice_provider.clone(),
            },
            session_file: args.session_file.clone(),
            request_timeout: args.request_timeout_secs.map(Duration::from_secs),
            log_level: args.log_level,
        })
    }
}

/// Parses the base URL and guarantees a trailing slash so relative joins keep the path
pub fn parse_api_base(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|source| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        source,
    })
}
