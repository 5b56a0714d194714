use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use courier_core::app::{AppBuilder, LifecycleView, PipelineStatus, ScheduleSweeper, WorkerGroup};
use courier_core::config::CourierConfig;
use courier_core::domain::{Channel, ContentItem, ContentStatus};
use courier_core::impls::{
    InMemoryContentStore, InMemoryScheduleStore, LocalAssetUploader, OpenAiResolver,
    TelegramGateway,
};
use courier_core::pipeline::{MetricsPoller, PipelineContext, SkipLog, request_dispatch};
use courier_core::ports::{ChannelGateway, Clock, SystemClock};
use courier_core::queue::InMemoryQueue;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Content publish pipeline")]
struct Cli {
    /// TOML config file (defaults to ./courier.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a seed file and run the pipeline until Ctrl-C.
    Run {
        #[arg(long)]
        seed: PathBuf,
    },
    /// Show channel info and whether the bot administers it.
    CheckChannel { external_id: String },
    /// Show what each seeded item may do next.
    Status {
        #[arg(long)]
        seed: PathBuf,
    },
}

/// Channels and items to preload into the in-memory store.
#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    items: Vec<ContentItem>,
}

impl Seed {
    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info,courier_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = CourierConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { seed } => run(config, Seed::read(&seed)?).await,
        Command::CheckChannel { external_id } => check_channel(&config, &external_id).await,
        Command::Status { seed } => status(Seed::read(&seed)?),
    }
}

fn gateway(config: &CourierConfig) -> Result<TelegramGateway> {
    Ok(TelegramGateway::new(
        config.telegram_token()?,
        config.telegram.api_base_url.clone(),
        config.telegram_timeout(),
    )?)
}

fn resolver(config: &CourierConfig) -> Result<OpenAiResolver> {
    let mut resolver = OpenAiResolver::new(
        config.openai_key()?,
        config.openai.base_url.clone(),
        config.openai_timeout(),
    )?;
    if let Some(model) = &config.openai.text_model {
        resolver = resolver.with_text_model(model);
    }
    if let Some(prompt) = &config.openai.default_prompt {
        resolver = resolver.with_default_prompt(prompt);
    }
    Ok(resolver)
}

async fn run(config: CourierConfig, seed: Seed) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryContentStore::new(Arc::clone(&clock)));
    let schedules = Arc::new(InMemoryScheduleStore::new());
    let queue = Arc::new(InMemoryQueue::new(
        config.retry_policy(),
        config.retry.max_attempts,
        Arc::clone(&clock),
    ));

    let ctx = Arc::new(PipelineContext {
        store: store.clone(),
        schedules: schedules.clone(),
        queue: queue.clone(),
        resolver: Arc::new(resolver(&config)?),
        uploader: Arc::new(LocalAssetUploader::new(
            config.assets.root_dir.clone(),
            config.assets.public_base_url.clone(),
        )),
        gateway: Arc::new(gateway(&config)?),
        clock: Arc::clone(&clock),
        metrics: config.metrics_schedule(),
        skips: Arc::new(SkipLog::new()),
    });

    let app = AppBuilder::pipeline(Arc::clone(&ctx))?.build()?;

    let channel_ids: Vec<_> = seed.channels.iter().map(|c| c.id).collect();
    for channel in seed.channels {
        store.insert_channel(channel).await;
    }
    let mut approved = Vec::new();
    for item in seed.items {
        if item.status == ContentStatus::Approved {
            approved.push(item.id);
        }
        store.insert_item(item).await;
    }

    for content_id in approved {
        let task_id = request_dispatch(queue.as_ref(), content_id).await?;
        info!(%content_id, %task_id, "dispatch requested");
    }

    let poller = MetricsPoller::new(Arc::clone(&ctx));
    for channel_id in channel_ids {
        match poller.arm_channel(channel_id).await {
            Ok(armed) => info!(%channel_id, armed, "channel metrics"),
            Err(e) => warn!(%channel_id, error = %e, "channel metrics not armed"),
        }
    }

    let workers = WorkerGroup::spawn(config.workers.count, queue.clone(), app.runtime);
    let sweeper = ScheduleSweeper::new(schedules.clone(), queue.clone(), Arc::clone(&clock))
        .spawn(config.sweep_interval());

    info!("courier running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");

    sweeper.shutdown_and_join().await;
    workers.shutdown_and_join().await;

    let status = PipelineStatus::collect(queue.as_ref(), schedules.as_ref(), &ctx.skips).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn check_channel(config: &CourierConfig, external_id: &str) -> Result<()> {
    let gateway = gateway(config)?;
    let info = gateway.get_info(external_id).await?;
    let is_admin = gateway.is_bot_admin(external_id).await;

    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("bot is administrator: {is_admin}");
    Ok(())
}

fn status(seed: Seed) -> Result<()> {
    for item in &seed.items {
        let view = LifecycleView::of(item.status);
        println!(
            "{} {} -> {}",
            item.id,
            serde_json::to_string(&view.status)?,
            serde_json::to_string(&view.accepts)?,
        );
    }
    Ok(())
}
