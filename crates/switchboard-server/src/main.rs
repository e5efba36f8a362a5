//! Switchboard Server
//!
//! Multi-agent chat gateway. Configuration comes from the environment.

use switchboard_server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    start_server(ServerConfig::from_env()).await
}
