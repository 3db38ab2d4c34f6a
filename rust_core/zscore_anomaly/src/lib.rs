//! zscore_anomaly
//!
//! Rolling z-score anomaly detection over a close-price series.
//!
//! Returns are period-over-period fractional changes. Each return is scored against the mean and
//! sample standard deviation (n - 1) of the trailing window of returns that ends at it, and any
//! point whose |z| exceeds the threshold is reported, labelled by the sign of z.
//!
//! Everything here is a pure function of its input: the caller passes the series and the
//! parameters, and gets back the full scored series plus the anomaly subsequence.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use connectors_common::types::PricePoint;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    #[error("insufficient data: need at least {required} points, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid close price {value} at index {index}")]
    InvalidPrice { index: usize, value: f64 },

    #[error("timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },
}

pub type Result<T> = std::result::Result<T, AnomalyError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub window: usize,    // trailing window length in returns
    pub threshold: f64,   // |z| strictly above this is an anomaly
}

impl Default for DetectorParams {
    fn default() -> Self {
        DetectorParams {
            window: 10,
            threshold: 2.0,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<()> {
        if self.window < 1 {
            return Err(AnomalyError::InvalidParameter {
                name: "window",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(AnomalyError::InvalidParameter {
                name: "threshold",
                reason: format!("must be a positive number, got {}", self.threshold),
            });
        }
        Ok(())
    }

    /// Fewest points that still form one complete window of returns.
    /// Saturates, so a window of `usize::MAX` can never be satisfied.
    pub fn min_points(&self) -> usize {
        self.window.saturating_add(1)
    }
}

/// What to do when the series is too short for a single window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsufficientDataPolicy {
    #[default]
    Fail,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Price Spike (Up)")]
    Up,
    #[serde(rename = "Price Drop (Down)")]
    Down,
}

impl Direction {
    pub fn from_z(z: f64) -> Self {
        if z > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Up => "Price Spike (Up)",
            Direction::Down => "Price Drop (Down)",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean: f64,
    /// `None` when the window has a single value (sample std is undefined).
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub ts: DateTime<Utc>,
    pub close: f64,
    #[serde(rename = "return")]
    pub ret: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Position of the point in the input series.
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub z_score: f64,
    pub direction: Direction,
}

/// Full scored series plus the anomalies drawn from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub params: DetectorParams,
    pub points: Vec<ScoredPoint>,
    pub anomalies: Vec<Anomaly>,
}

impl Analysis {
    pub fn empty(params: DetectorParams) -> Self {
        Analysis { params, points: Vec::new(), anomalies: Vec::new() }
    }

    pub fn count_by_direction(&self, direction: Direction) -> usize {
        self.anomalies.iter().filter(|a| a.direction == direction).count()
    }
}

/// Period-over-period returns, aligned with `points`. Index 0 has no prior price.
pub fn compute_returns(points: &[PricePoint]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(points.len());
    if points.is_empty() {
        return out;
    }
    out.push(None);
    for pair in points.windows(2) {
        out.push(Some(pair[1].close / pair[0].close - 1.0));
    }
    out
}

/// Trailing mean and sample standard deviation over `window` returns ending at each index.
/// Undefined until the window holds `window` defined returns.
pub fn rolling_stats(returns: &[Option<f64>], window: usize) -> Vec<Option<RollingStats>> {
    let mut out = Vec::with_capacity(returns.len());
    if window == 0 {
        out.resize(returns.len(), None);
        return out;
    }
    for i in 0..returns.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        let slice = &returns[i + 1 - window..=i];
        let vals: Option<Vec<f64>> = slice.iter().copied().collect();
        out.push(vals.map(|w| window_stats(&w)));
    }
    out
}

fn window_stats(w: &[f64]) -> RollingStats {
    let n = w.len() as f64;
    let mean = w.iter().sum::<f64>() / n;
    let std = if w.len() < 2 {
        None
    } else if w.iter().all(|v| *v == w[0]) {
        // exact zero; two-pass arithmetic can leave a residue
        Some(0.0)
    } else {
        let var = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        Some(var.sqrt())
    };
    RollingStats { mean, std }
}

/// z = (return - mean) / std. Undefined wherever any input is undefined or std is zero.
pub fn compute_zscores(
    returns: &[Option<f64>],
    stats: &[Option<RollingStats>],
) -> Vec<Option<f64>> {
    returns
        .iter()
        .zip(stats.iter())
        .map(|(r, s)| match (r, s) {
            (Some(r), Some(RollingStats { mean, std: Some(std) })) if *std > 0.0 => {
                let z = (r - mean) / std;
                if z.is_finite() { Some(z) } else { None }
            }
            _ => None,
        })
        .collect()
}

/// Zip parallel timestamp (unix ms) and close arrays into a series.
pub fn series_from_millis(timestamps_ms: &[i64], closes: &[f64]) -> Result<Vec<PricePoint>> {
    if timestamps_ms.len() != closes.len() {
        return Err(AnomalyError::InvalidParameter {
            name: "closes",
            reason: format!(
                "length {} does not match {} timestamps",
                closes.len(),
                timestamps_ms.len()
            ),
        });
    }
    timestamps_ms
        .iter()
        .zip(closes.iter())
        .map(|(ms, c)| {
            PricePoint::from_millis(*ms, *c).ok_or_else(|| AnomalyError::InvalidParameter {
                name: "timestamps",
                reason: format!("{} ms is out of range", ms),
            })
        })
        .collect()
}

fn validate_series(points: &[PricePoint]) -> Result<()> {
    for (i, p) in points.iter().enumerate() {
        if !p.close.is_finite() || p.close <= 0.0 {
            return Err(AnomalyError::InvalidPrice { index: i, value: p.close });
        }
        if i > 0 && p.ts <= points[i - 1].ts {
            return Err(AnomalyError::UnorderedTimestamps { index: i });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreDetector {
    params: DetectorParams,
}

impl ZScoreDetector {
    pub fn new(params: DetectorParams) -> Result<Self> {
        params.validate()?;
        Ok(ZScoreDetector { params })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Score every point and select the anomalies.
    pub fn analyze(&self, points: &[PricePoint]) -> Result<Analysis> {
        let required = self.params.min_points();
        if points.len() < required {
            return Err(AnomalyError::InsufficientData { required, got: points.len() });
        }
        validate_series(points)?;

        info!("Calculating returns...");
        let returns = compute_returns(points);
        info!("Calculating rolling mean and std (window {})...", self.params.window);
        let stats = rolling_stats(&returns, self.params.window);
        info!("Calculating z-scores...");
        let zscores = compute_zscores(&returns, &stats);

        info!("Detecting anomalies (|z| > {})...", self.params.threshold);
        let mut scored = Vec::with_capacity(points.len());
        let mut anomalies = Vec::new();
        for (i, p) in points.iter().enumerate() {
            let z = zscores[i];
            scored.push(ScoredPoint {
                ts: p.ts,
                close: p.close,
                ret: returns[i],
                mean: stats[i].map(|s| s.mean),
                std: stats[i].and_then(|s| s.std),
                z,
            });
            if let Some(z) = z {
                if z.abs() > self.params.threshold {
                    anomalies.push(Anomaly {
                        index: i,
                        ts: p.ts,
                        close: p.close,
                        z_score: z,
                        direction: Direction::from_z(z),
                    });
                }
            }
        }
        debug!(
            "scored {} points (window={}, threshold={}): {} anomalies",
            points.len(),
            self.params.window,
            self.params.threshold,
            anomalies.len()
        );
        Ok(Analysis { params: self.params, points: scored, anomalies })
    }

    /// Like [`analyze`](Self::analyze), with too-short input handled per `policy`.
    pub fn analyze_with_policy(
        &self,
        points: &[PricePoint],
        policy: InsufficientDataPolicy,
    ) -> Result<Analysis> {
        match self.analyze(points) {
            Err(AnomalyError::InsufficientData { required, got })
                if policy == InsufficientDataPolicy::Empty =>
            {
                warn!(
                    "only {} points, {} needed for one window; reporting no anomalies",
                    got, required
                );
                Ok(Analysis::empty(self.params))
            }
            other => other,
        }
    }

    pub fn detect(&self, points: &[PricePoint]) -> Result<Vec<Anomaly>> {
        Ok(self.analyze(points)?.anomalies)
    }
}

pub fn detect_anomalies(points: &[PricePoint], params: DetectorParams) -> Result<Vec<Anomaly>> {
    ZScoreDetector::new(params)?.detect(points)
}
