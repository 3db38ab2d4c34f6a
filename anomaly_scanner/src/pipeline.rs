use anyhow::{Context, Result};
use log::info;
use report::ChartOptions;
use std::fs::File;
use std::io::BufWriter;
use zscore_anomaly::{Analysis, PricePoint, ZScoreDetector};

use crate::config::AppConfig;

/// Score the fetched series, honouring the configured insufficient-data policy.
pub fn analyze(cfg: &AppConfig, points: &[PricePoint]) -> Result<Analysis> {
    let detector = ZScoreDetector::new(cfg.detector)?;
    let analysis = detector.analyze_with_policy(points, cfg.output.on_insufficient_data)?;
    info!("{} anomalies in {} points", analysis.anomalies.len(), points.len());
    Ok(analysis)
}

pub fn render(cfg: &AppConfig, analysis: &Analysis) -> String {
    let opts = ChartOptions {
        title: format!("{} Close Price with Anomaly Detection", cfg.request.symbol),
        width: cfg.output.width,
        height: cfg.output.height,
    };
    report::render(analysis, cfg.output.mode, &opts)
}

/// Write the CSV and JSON exports that are configured.
pub fn export(cfg: &AppConfig, analysis: &Analysis) -> Result<()> {
    if let Some(path) = &cfg.output.csv {
        let f = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        report::write_csv(analysis, BufWriter::new(f))?;
        info!("wrote scored series to {}", path.display());
    }
    if let Some(path) = &cfg.output.json {
        let f = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        report::write_json(analysis, BufWriter::new(f))?;
        info!("wrote analysis to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use report::OutputMode;
    use zscore_anomaly::{AnomalyError, InsufficientDataPolicy};

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + Duration::minutes(5 * i as i64), *c))
            .collect()
    }

    #[test]
    fn short_series_fails_by_default() {
        let cfg = AppConfig::default();
        let err = analyze(&cfg, &series(&[100.0; 5])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AnomalyError>(),
            Some(&AnomalyError::InsufficientData { required: 11, got: 5 })
        );
    }

    #[test]
    fn short_series_renders_empty_report_when_allowed() {
        let mut cfg = AppConfig::default();
        cfg.output.on_insufficient_data = InsufficientDataPolicy::Empty;
        let analysis = analyze(&cfg, &series(&[100.0; 5])).unwrap();
        assert!(analysis.anomalies.is_empty());

        assert!(render(&cfg, &analysis).ends_with("No price data to chart.\n"));
        cfg.output.mode = OutputMode::List;
        assert_eq!(render(&cfg, &analysis), "No anomalies detected.\n");
    }

    #[test]
    fn spike_flows_through_to_report_and_exports() {
        let mut closes = vec![100.0; 11];
        closes.push(200.0);
        let dir = std::env::temp_dir().join(format!("anomaly-scanner-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut cfg = AppConfig::default();
        cfg.request.symbol = "ETH-USD".to_string();
        cfg.output.mode = OutputMode::Annotated;
        cfg.output.csv = Some(dir.join("scored.csv"));
        cfg.output.json = Some(dir.join("analysis.json"));

        let analysis = analyze(&cfg, &series(&closes)).unwrap();
        assert_eq!(analysis.anomalies.len(), 1);
        let text = render(&cfg, &analysis);
        assert!(text.contains("ETH-USD Close Price with Anomaly Detection"));
        assert!(text.contains("Price Spike (Up)"));

        export(&cfg, &analysis).unwrap();
        let csv = std::fs::read_to_string(dir.join("scored.csv")).unwrap();
        assert_eq!(csv.lines().count(), 13);
        let json = std::fs::read_to_string(dir.join("analysis.json")).unwrap();
        assert!(json.contains("\"anomalies\""));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
