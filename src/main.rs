use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    autologin_cli::cli::run().await
}
