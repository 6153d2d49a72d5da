#[tokio::main]
async fn main() -> anyhow::Result<()> {
    avatar_stream_lib::run().await
}
