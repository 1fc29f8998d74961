//! Thin CLI wrappers over the queue (spec §6): `queue_stats`, `hint`, and
//! `login`. Everything else about running a crawl lives outside this crate.

use clap::{Parser, Subcommand, ValueEnum};
use frontier::queue::Queue;
use frontier::selector::SelectionPolicy;
use frontier::store::RedisGateway;
use frontier::FrontierConfig;
use frontier::metrics::Metrics;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "frontierctl", about = "Operational tools for the crawl frontier queue")]
struct Cli {
    /// Redis-compatible connection string.
    #[arg(long, env = "FRONTIER_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Load the frontier config from a `[frontier]` TOML table instead of
    /// individual flags/env vars (e.g. a table lifted out of a larger
    /// crawl-engine config file). `--redis-url`/env still apply on top.
    #[arg(long, env = "FRONTIER_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print total length, domain count, and per-queue stats for a spider.
    QueueStats { spider: String },
    /// Pin or unpin a hint URL for a spider.
    Hint {
        spider: String,
        action: HintAction,
        url: String,
    },
    /// Store login credentials for a URL prefix.
    Login {
        spider: String,
        url: String,
        login: String,
        password: String,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum HintAction {
    Pin,
    Unpin,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    frontier::init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "frontierctl failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file = cli.config.clone();
    let redis_url = cli.redis_url.clone();
    match cli.command {
        Command::QueueStats { spider } => {
            let queue = open_queue(&redis_url, config_file.as_deref(), &spider).await?;
            let stats = queue.stats().await?;
            println!("len={} n_domains={}", stats.len, stats.n_domains);
            for entry in stats.queues {
                println!("{}\tpriority={}\tcardinality={}", entry.key, entry.priority, entry.cardinality);
            }
            Ok(())
        }
        Command::Hint { spider, action, url } => {
            let queue = open_queue(&redis_url, config_file.as_deref(), &spider).await?;
            match action {
                HintAction::Pin => queue.add_hint_url(&url).await?,
                HintAction::Unpin => queue.remove_hint_url(&url).await?,
            }
            Ok(())
        }
        Command::Login { spider, url, login, password } => {
            let queue = open_queue(&redis_url, config_file.as_deref(), &spider).await?;
            queue.add_login_credentials(&url, &login, &password).await?;
            Ok(())
        }
    }
}

/// Build a [`FrontierConfig`], either from a `[frontier]` TOML table on
/// disk (with `spider`/`redis_url` filled in from the CLI on top) or from
/// flags/env alone.
async fn open_queue(redis_url: &str, config_path: Option<&std::path::Path>, spider: &str) -> anyhow::Result<Queue> {
    let gateway = RedisGateway::connect(redis_url).await?;
    let store: Arc<dyn frontier::store::StoreGateway> = Arc::new(gateway);
    let mut config = match config_path {
        Some(path) => FrontierConfig::from_toml_file(path)?,
        None => FrontierConfig::for_prefix(spider),
    };
    config.prefix = spider.to_string();
    config.redis_url = redis_url.to_string();
    let queue = Queue::new(store, config, SelectionPolicy::Softmax, Arc::new(Metrics::new())).await?;
    Ok(queue)
}
