use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parse_blog::config::{Cli, Command, Config};
use parse_blog::db;
use parse_blog::mail::LogMailer;
use parse_blog::routes;
use parse_blog::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::AddCategory { title } => {
            let id = db::categories::create_category(&pool, &title)?;
            println!("Created category {id}: {}", title.trim());
            Ok(())
        }
        Command::Serve => {
            // Ensure uploads directory exists
            std::fs::create_dir_all(config.uploads_path())?;

            let state = AppState {
                db: pool,
                config: config.clone(),
                mailer: Arc::new(LogMailer::new(data_dir.join("outbox"))),
            };
            let app = routes::app(state);

            // Start server
            let addr: SocketAddr =
                format!("{}:{}", config.server.host, config.server.port).parse()?;
            tracing::info!("Listening on http://{}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}
