mod config;
mod error;
mod filter;
mod message;
mod protocol;
mod registry;
mod room;
mod router;
mod server;
mod session;
mod transport;
mod types;
mod user;

use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use error::ChatError;
use server::Server;

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_relay=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        "room relay v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr()
    );

    Server::new(config).run().await
}
