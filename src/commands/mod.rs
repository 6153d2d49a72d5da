pub mod render_api;
pub mod stream_api;

use crate::config::{Config, ServiceArgs};
use crate::controller::SessionController;
use crate::logger::{ConsoleEvents, EventSink};
use crate::peer::{RtcTransportFactory, RtpPlaybackSink};
use crate::session::FileSessionStore;
use crate::signaling::HttpSignalingClient;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "avatar-stream", version, about = "Drive a real-time avatar stream")]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or resume the stream and keep it connected until Ctrl-C
    Start {
        /// Delete the stream on exit instead of keeping it for a resume
        #[arg(long)]
        close_on_exit: bool,
    },
    /// Delete the stream and forget its id
    Close,
    /// Ask the avatar to say the given text
    Render {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Stop the narration in progress
    Interrupt,
    /// Print the persisted stream id, if any
    Status,
}

/// Wires the HTTP client, durable store and webrtc transport together
pub fn build_controller(config: &Config) -> anyhow::Result<SessionController> {
    let events: Arc<dyn EventSink> = Arc::new(ConsoleEvents);
    let store = match &config.session_file {
        Some(path) => FileSessionStore::new(path),
        None => FileSessionStore::open_default()?,
    };
    let signaling = HttpSignalingClient::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.request_timeout,
        events.clone(),
    )?;
    Ok(SessionController::new(
        Arc::new(store),
        Arc::new(signaling),
        Arc::new(RtcTransportFactory),
        Arc::new(RtpPlaybackSink::new()),
        events,
        config.profile.clone(),
    ))
}

pub async fn dispatch(command: Command, controller: SessionController) -> anyhow::Result<()> {
    match command {
        Command::Start { close_on_exit } => stream_api::start(controller, close_on_exit).await,
        Command::Close => stream_api::close(controller).await,
        Command::Render { text } => render_api::render(&controller, &text.join(" ")).await,
        Command::Interrupt => render_api::interrupt(&controller).await,
        Command::Status => stream_api::status(&controller),
    }
}
