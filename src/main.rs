//! AI release-note watcher: batch entrypoint.
//! One action per invocation; see `ai-updates --help`.

use ai_updates::config::AppConfig;
use ai_updates::ingest::providers::HttpCollector;
use ai_updates::ingest::sources::SOURCES;
use ai_updates::notify::discord::DiscordWebhook;
use ai_updates::pipeline::{self, MaintenanceAction, Pipeline};
use ai_updates::store::Store;
use ai_updates::summarize::AiSummarizer;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ai-updates", about = "Collect, summarize and post AI release notes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect all sources once; send important items immediately
    Run,
    /// Post everything not yet included in a digest
    Digest,
    /// reset | prune-unsent (falls back to MAINTENANCE_ACTION)
    Maintenance { action: Option<String> },
    /// Post sample messages: all | openai | gemini | claude | digest
    Preview {
        #[arg(long)]
        target: Option<String>,
    },
}

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_updates=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn preview(cfg: &AppConfig, target: Option<String>) {
    let target = target.unwrap_or_else(|| env_or("PREVIEW_TARGET", "all"));
    pipeline::run_preview(cfg, &DiscordWebhook::new(), &target).await;
}

async fn execute(command: Commands, cfg: &AppConfig, store: &Store) -> Result<()> {
    let notifier = DiscordWebhook::new();
    match command {
        Commands::Run => {
            let collector = HttpCollector::new(&cfg.user_agent)?;
            let summarizer = AiSummarizer::from_config(&cfg.summarizer)?;
            info!(provider = summarizer.provider_name(), "summarizer ready");
            let pipeline = Pipeline {
                cfg,
                store,
                collector: &collector,
                summarizer: &summarizer,
                notifier: &notifier,
            };
            pipeline.run_once(SOURCES).await;
        }
        Commands::Digest => {
            pipeline::run_digest(cfg, store, &notifier).await?;
        }
        Commands::Maintenance { action } => {
            let raw = action.unwrap_or_else(|| env_or("MAINTENANCE_ACTION", ""));
            let action: MaintenanceAction = raw.parse()?;
            pipeline::run_maintenance(store, action).await?;
        }
        Commands::Preview { target } => preview(cfg, target).await,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env when present; real env vars take precedence.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;

    let command = match cli.command {
        // Preview never touches the store.
        Commands::Preview { target } => {
            preview(&cfg, target).await;
            return Ok(());
        }
        other => other,
    };

    let store = Store::open(&cfg.db_path)
        .await
        .with_context(|| format!("opening store at {}", cfg.db_path.display()))?;

    let result = execute(command, &cfg, &store).await;
    store.close().await;
    result
}
