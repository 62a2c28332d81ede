use anyhow::Result;
use clap::Parser;
use recipe_saver_mcp::{config::Config, server::run_server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "recipe-saver-mcp")]
#[command(about = "Recipe store exposed to AI agents over MCP and to apps over REST")]
struct Args {
    /// Database file path
    #[arg(long, env = "DB_PATH", default_value = "./data/recipes.db")]
    database_path: String,

    /// Server host
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for the daily rolling log file
    #[arg(long, default_value = "./data/logs")]
    logs_dir: String,

    /// Seconds between keep-alive comments on open SSE streams
    #[arg(long, default_value = "30")]
    keep_alive_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing with both console and file logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let logs_dir = std::path::Path::new(&args.logs_dir);
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter.clone()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter),
        )
        .init();

    info!("Starting Recipe Saver MCP Server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", args.database_path);
    info!("Server: {}:{}", args.host, args.port);

    let config = Config {
        database_path: args.database_path,
        host: args.host,
        port: args.port,
        keep_alive_secs: args.keep_alive_secs,
    };

    run_server(config).await?;

    Ok(())
}
