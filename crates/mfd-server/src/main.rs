use mfd_server::{Result, config::ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = ServerConfig::load()?;
    mfd_server::run(args).await
}
