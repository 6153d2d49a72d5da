use crate::controller::{SessionController, StartOutcome};
use tracing::info;

/// Creates or resumes the stream and keeps it connected until Ctrl-C
pub async fn start(mut controller: SessionController, close_on_exit: bool) -> anyhow::Result<()> {
    match controller.start().await? {
        StartOutcome::Negotiating {
            session_id,
            resumed,
        } => {
            let verb = if resumed { "resumed" } else { "created" };
            println!("stream {session_id} {verb}; press Ctrl-C to stop");
        }
        StartOutcome::Expired => {
            println!("stored stream has expired; run start again for a new one");
            return Ok(());
        }
        StartOutcome::MissingNegotiationData => return Ok(()),
    }

    loop {
        tokio::select! {
            alive = controller.pump() => {
                if !alive {
                    info!("transport event stream ended");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if close_on_exit {
        controller.close().await?;
    } else {
        controller.suspend().await;
        if let Some(id) = controller.current_session()? {
            println!("stream {id} kept; run start again to resume or close to delete it");
        }
    }
    Ok(())
}

pub async fn close(mut controller: SessionController) -> anyhow::Result<()> {
    controller.close().await?;
    Ok(())
}

pub fn status(controller: &SessionController) -> anyhow::Result<()> {
    match controller.current_session()? {
        Some(id) => println!("{id}"),
        None => println!("no active stream"),
    }
    Ok(())
}
