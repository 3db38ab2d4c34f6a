//! Offline detection over a saved price series.
//!
//! Input JSON:
//! `{ "params": {"window": 10, "threshold": 2.0}, "points": [{"ts": "...", "close": 1.0}, ...] }`.
//! `params` is optional; command-line values win over it.
//!
//! Built with `--features cli`.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use zscore_anomaly::{DetectorParams, InsufficientDataPolicy, PricePoint, ZScoreDetector};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rolling z-score anomaly detection over a JSON price series")]
struct Args {
    /// Input JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the full analysis as JSON (stdout listing only if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rolling window length
    #[arg(short, long)]
    window: Option<usize>,

    /// |z| threshold
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Report no anomalies instead of failing when the series is too short
    #[arg(long)]
    allow_insufficient: bool,
}

#[derive(Deserialize)]
struct InputFile {
    #[serde(default)]
    params: DetectorParams,
    points: Vec<PricePoint>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let input: InputFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.input.display()))?;

    let mut params = input.params;
    if let Some(w) = args.window {
        params.window = w;
    }
    if let Some(t) = args.threshold {
        params.threshold = t;
    }
    let policy = if args.allow_insufficient {
        InsufficientDataPolicy::Empty
    } else {
        InsufficientDataPolicy::Fail
    };

    info!("loaded {} points from {}", input.points.len(), args.input.display());
    let detector = ZScoreDetector::new(params)?;
    let analysis = detector.analyze_with_policy(&input.points, policy)?;

    for a in &analysis.anomalies {
        println!(
            "{}  close={:.2}  z={:+.3}  {}",
            a.ts.format("%Y-%m-%d %H:%M"),
            a.close,
            a.z_score,
            a.direction
        );
    }
    println!("{} anomalies in {} points", analysis.anomalies.len(), input.points.len());

    if let Some(out) = args.output {
        fs::write(&out, serde_json::to_string_pretty(&analysis)?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Written analysis to {}", out.display());
    }
    Ok(())
}
