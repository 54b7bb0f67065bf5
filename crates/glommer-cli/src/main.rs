use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glommer_core::{EngineConfig, Scheduler};
use glommer_store::SqliteChannelStore;

/// Scheduled scrape pipeline
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    /// Run one scrape pass over every enabled channel
    Scrape(ScrapeArgs),
}

/// Scrape every enabled channel and persist discovered entries
#[derive(Debug, clap::Args)]
pub struct ScrapeArgs {
    /// Path to the SQLite database file (created if missing)
    #[clap(env = "GLOMMER_DATABASE", long, default_value = "glommer.sqlite")]
    pub database: String,
    /// Override the number of channel workers
    #[clap(long)]
    pub channel_workers: Option<usize>,
    /// Override the number of entry workers
    #[clap(long)]
    pub entry_workers: Option<usize>,
    /// Override the insert buffer batch size
    #[clap(long)]
    pub batch_size: Option<usize>,
    /// Override the per-request timeout, in seconds
    #[clap(long)]
    pub request_timeout_secs: Option<u64>,
    /// Override the whole-run deadline, in seconds
    #[clap(long)]
    pub global_timeout_secs: Option<u64>,
}

impl From<&ScrapeArgs> for EngineConfig {
    fn from(args: &ScrapeArgs) -> Self {
        let mut conf = EngineConfig::default();
        if let Some(n) = args.channel_workers {
            conf.channel_workers = n;
        }
        if let Some(n) = args.entry_workers {
            conf.entry_workers = n;
        }
        if let Some(n) = args.batch_size {
            conf.batch_size = n;
        }
        if let Some(secs) = args.request_timeout_secs {
            conf.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.global_timeout_secs {
            conf.global_timeout = Duration::from_secs(secs);
        }
        conf
    }
}

async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let config: EngineConfig = (&args).into();
    let global_timeout = config.global_timeout;

    let store = SqliteChannelStore::connect(&args.database).await?;
    let scheduler = Scheduler::new(config, Arc::new(store))?;

    let stats = match tokio::time::timeout(global_timeout, scheduler.run()).await {
        Ok(result) => result?,
        Err(_) => {
            log::error!("scrape run exceeded its global timeout of {global_timeout:?}");
            anyhow::bail!("global timeout exceeded");
        }
    };

    println!("Processed {} entries from {} channels", stats.entries, stats.channels);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    match args.cmd {
        SubCommand::Scrape(args) => rt.block_on(scrape(args)),
    }
}
