use crate::controller::SessionController;

/// Text for the avatar to speak
pub async fn render(controller: &SessionController, text: &str) -> anyhow::Result<()> {
    if !controller.render_text(text).await? {
        println!("no active stream; run start first");
    }
    Ok(())
}

pub async fn interrupt(controller: &SessionController) -> anyhow::Result<()> {
    if !controller.interrupt().await? {
        println!("no active stream");
    }
    Ok(())
}
