mod config;
mod pipeline;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use connectors_common::types::{Interval, Period};
use log::info;
use report::OutputMode;
use std::path::PathBuf;
use zscore_anomaly::InsufficientDataPolicy;

use crate::config::{AppConfig, SourceKind};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Flag rolling z-score anomalies in short-interval price history"
)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data source: yahoo or coingecko
    #[arg(long)]
    source: Option<SourceKind>,

    /// Symbol, e.g. BTC-USD
    #[arg(short, long)]
    symbol: Option<String>,

    /// Bar interval, e.g. 5m
    #[arg(short, long)]
    interval: Option<Interval>,

    /// Look-back period, e.g. 1d
    #[arg(short, long)]
    period: Option<Period>,

    /// Rolling window length
    #[arg(short, long)]
    window: Option<usize>,

    /// |z| threshold
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Output: chart, annotated or list
    #[arg(short, long)]
    output: Option<OutputMode>,

    /// Write the scored series as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full analysis as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Report no anomalies instead of failing when there is too little data
    #[arg(long)]
    allow_insufficient: bool,
}

impl Args {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(v) = self.source {
            cfg.source.kind = v;
        }
        if let Some(v) = self.symbol {
            cfg.request.symbol = v;
        }
        if let Some(v) = self.interval {
            cfg.request.interval = v;
        }
        if let Some(v) = self.period {
            cfg.request.period = v;
        }
        if let Some(v) = self.window {
            cfg.detector.window = v;
        }
        if let Some(v) = self.threshold {
            cfg.detector.threshold = v;
        }
        if let Some(v) = self.output {
            cfg.output.mode = v;
        }
        if self.csv.is_some() {
            cfg.output.csv = self.csv;
        }
        if self.json.is_some() {
            cfg.output.json = self.json;
        }
        if self.allow_insufficient {
            cfg.output.on_insufficient_data = InsufficientDataPolicy::Empty;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = config::load_config(args.config.as_deref())?;
    args.apply(&mut cfg);
    config::validate(&cfg)?;

    info!("Downloading {} data...", cfg.request.symbol);
    let points = source::fetch_history(&cfg).await.with_context(|| {
        format!("fetching {} history from {}", cfg.request.symbol, cfg.source.kind)
    })?;

    let analysis = pipeline::analyze(&cfg, &points)?;
    print!("{}", pipeline::render(&cfg, &analysis));
    pipeline::export(&cfg, &analysis)?;
    Ok(())
}
