use clap::Parser;

use shiftdesk_api::cli::Cli;
use shiftdesk_api::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiftdesk_api=info,tower_http=info".into()),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting Shiftdesk API in {:?} mode", config.environment);

    let cli = Cli::parse();
    shiftdesk_api::cli::run(cli).await
}
