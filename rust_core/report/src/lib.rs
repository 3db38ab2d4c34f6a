//! Presentation of an [`Analysis`]: console listing, anomaly table, text chart and file export.
//! Everything here only reads the analysis.

pub mod chart;
pub mod export;
pub mod listing;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zscore_anomaly::Analysis;

pub use chart::{axis_time_format, render_chart, ChartOptions};
pub use export::{write_csv, write_json};
pub use listing::{render_listing, render_summary, render_table};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Price chart with anomalies marked.
    #[default]
    Chart,
    /// Chart followed by the anomaly table.
    Annotated,
    /// Plain console listing.
    List,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputMode::Chart => "chart",
            OutputMode::Annotated => "annotated",
            OutputMode::List => "list",
        })
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chart" => Ok(OutputMode::Chart),
            "annotated" => Ok(OutputMode::Annotated),
            "list" => Ok(OutputMode::List),
            other => Err(format!(
                "unknown output mode '{}', expected chart, annotated or list",
                other
            )),
        }
    }
}

pub fn render(analysis: &Analysis, mode: OutputMode, opts: &ChartOptions) -> String {
    match mode {
        OutputMode::Chart => render_chart(analysis, opts),
        OutputMode::Annotated => {
            let mut out = render_chart(analysis, opts);
            out.push('\n');
            if analysis.anomalies.is_empty() {
                out.push_str("No anomalies detected.\n");
            } else {
                out.push_str(&render_table(analysis));
                out.push('\n');
            }
            out.push_str(&render_summary(analysis));
            out
        }
        OutputMode::List => render_listing(analysis),
    }
}
