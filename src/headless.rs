//! Console front-end
//!
//! Starts one session from the command line, logs alerts instead of showing
//! them, and stops cleanly on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::event_bus::{AppEvent, EventBus};
use crate::models::StartRequest;
use crate::notifier::LogNotifier;
use crate::{logger, paths};

/// Watch the screen and nudge when distracted
#[derive(Parser, Debug)]
#[command(name = "distraction-monitor")]
#[command(about = "Periodic screen capture with vision classification and focus nudges", long_about = None)]
pub struct Args {
    /// What you are working on
    #[arg(short, long)]
    pub task: Option<String>,

    /// Seconds between captures (5-3600), defaults to the configured interval
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Comma separated activity labels, overrides the configuration
    #[arg(long, value_delimiter = ',')]
    pub activities: Option<Vec<String>>,

    /// Comma separated distracting terms, overrides the configuration
    #[arg(long, value_delimiter = ',')]
    pub blacklist: Option<Vec<String>>,

    /// Print the statistics summary and exit
    #[arg(long)]
    pub stats: bool,

    /// Data directory (or set DISTRACTION_MONITOR_DATA_DIR)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

impl Args {
    fn start_request(&self) -> StartRequest {
        StartRequest {
            interval: self.interval,
            task_description: self.task.clone(),
            possible_activities: self.activities.clone(),
            blacklisted_terms: self.blacklist.clone(),
        }
    }
}

/// Parse arguments, set up logging and run until Ctrl-C
pub fn run() -> Result<()> {
    let args = Args::parse();
    let data_dir = args.data_dir.clone().unwrap_or_else(paths::default_data_dir);

    let _guard = logger::init(&paths::log_dir(&data_dir))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(args, data_dir))
}

async fn serve(args: Args, data_dir: PathBuf) -> Result<()> {
    let events = Arc::new(EventBus::new(256));
    let controller = crate::bootstrap(&data_dir, Arc::new(LogNotifier), events.clone()).await?;

    if args.stats {
        println!("{}", controller.stats_summary().await);
        return Ok(());
    }

    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            if let AppEvent::StatusChanged { message, .. } = event {
                info!("{}", message);
            }
        }
    });

    let status = controller.start(args.start_request()).await?;
    println!("{} - press Ctrl-C to stop", status.message);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    match controller.shutdown().await {
        Ok(outcome) => info!("stopped ({:?})", outcome),
        Err(e) => warn!("shutdown incomplete: {}", e),
    }

    println!("{}", controller.stats_summary().await);
    Ok(())
}
