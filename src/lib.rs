pub mod commands;
pub mod config;
pub mod controller;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

use clap::Parser;

pub use config::{AvatarProfile, Config};
pub use controller::{ControllerError, SessionController, StartOutcome};
pub use logger::{ConsoleEvents, EventSink, SessionEvent};
pub use peer::SessionId;
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
pub use signaling::{HttpSignalingClient, SignalingApi, SignalingError};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = commands::Cli::parse();
    let config = Config::from_args(&cli.service)?;
    logger::init(config.log_level)?;

    let controller = commands::build_controller(&config)?;
    commands::dispatch(cli.command, controller).await
}
