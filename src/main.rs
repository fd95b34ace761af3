use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pipewatch::alerts::slack::SlackNotifier;
use pipewatch::alerts::Notifier;
use pipewatch::config::AppConfig;
use pipewatch::server::{create_router, AppState};
use pipewatch::shutdown::wait_for_shutdown;

#[derive(Parser)]
#[command(name = "pipewatch", about = "CI/CD failure monitor with Slack alerts and rollback dispatch")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Send a test message through the configured Slack webhook
    TestAlert {
        #[arg(short, long, default_value = "🧪 Test alert from Pipeline Monitor")]
        message: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::TestAlert { message } => test_alert(&config, &message).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        environment = %config.environment,
        "Starting Pipeline Monitor"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn test_alert(config: &AppConfig, message: &str) -> anyhow::Result<()> {
    let notifier = SlackNotifier::new(config)?;
    let outcome = notifier.notify(message).await;

    if !outcome.attempted {
        anyhow::bail!("Slack webhook URL not configured (set SLACK_WEBHOOK_URL)");
    }
    if !outcome.succeeded {
        anyhow::bail!("Slack alert failed: {}", outcome.detail);
    }

    tracing::info!(detail = %outcome.detail, "Test alert delivered");
    Ok(())
}
