use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gnews_thumbs::cli::{run_fetch, Cli, Command};
use gnews_thumbs::config::Config;
use gnews_thumbs::pipeline::NewsService;
use gnews_thumbs::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gnews_thumbs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_or_default(&cli.config)?;
    let news = NewsService::from_config(&config)?;

    match cli.command() {
        Command::Fetch(args) => {
            run_fetch(&news, &args).await?;
        }
        Command::Serve(args) => {
            let host = args.host.unwrap_or(config.server.host);
            let port = args.port.unwrap_or(config.server.port);

            let state = Arc::new(AppState {
                news: Arc::new(news),
            });
            let app = routes::app(state);

            // Start server
            let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
            info!("API running at http://{}:{}", host, port);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
