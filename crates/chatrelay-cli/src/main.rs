//! Chatrelay - IRC relay entry point

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "chatrelay=info,chatrelay_cli=info,chatrelay_context=info,chatrelay_irc=info".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting {} v{}", chatrelay_cli::crate_name(), env!("CARGO_PKG_VERSION"));

    let cli = chatrelay_cli::Cli::parse();
    chatrelay_cli::run(cli).await
}
