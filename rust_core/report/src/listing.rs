use tabled::{Table, Tabled};
use zscore_anomaly::{Analysis, Direction};

#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Close")]
    close: String,
    #[tabled(rename = "Z-Score")]
    z_score: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn render_listing(analysis: &Analysis) -> String {
    if analysis.anomalies.is_empty() {
        return "No anomalies detected.\n".to_string();
    }
    let mut out = format!("Detected {} anomalies:\n", analysis.anomalies.len());
    for a in &analysis.anomalies {
        out.push_str(&format!(
            "{} | close {:>12.2} | z {:>+7.3} | {}\n",
            a.ts.format(TIME_FMT),
            a.close,
            a.z_score,
            a.direction
        ));
    }
    out
}

pub fn render_table(analysis: &Analysis) -> String {
    let rows = analysis.anomalies.iter().map(|a| AnomalyRow {
        time: a.ts.format(TIME_FMT).to_string(),
        close: format!("{:.2}", a.close),
        z_score: format!("{:+.3}", a.z_score),
        direction: a.direction.to_string(),
    });
    Table::new(rows).to_string()
}

pub fn render_summary(analysis: &Analysis) -> String {
    format!(
        "Total: {} anomalies ({} up, {} down) in {} points, window {}, threshold {}\n",
        analysis.anomalies.len(),
        analysis.count_by_direction(Direction::Up),
        analysis.count_by_direction(Direction::Down),
        analysis.points.len(),
        analysis.params.window,
        analysis.params.threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tests::analysis_of;

    #[test]
    fn listing_names_each_anomaly() {
        let mut closes = vec![100.0; 11];
        closes.push(200.0);
        let out = render_listing(&analysis_of(&closes));
        assert!(out.starts_with("Detected 1 anomalies:"));
        assert!(out.contains("Price Spike (Up)"));
        assert!(out.contains("200.00"));
    }

    #[test]
    fn listing_empty() {
        assert_eq!(render_listing(&analysis_of(&[5.0; 20])), "No anomalies detected.\n");
    }

    #[test]
    fn table_has_headers_and_rows() {
        let mut closes = vec![100.0; 11];
        closes.push(50.0);
        let out = render_table(&analysis_of(&closes));
        for h in ["Time", "Close", "Z-Score", "Direction"] {
            assert!(out.contains(h), "missing header {}", h);
        }
        assert!(out.contains("Price Drop (Down)"));
        assert!(out.contains("50.00"));
    }

    #[test]
    fn summary_counts_directions() {
        let mut closes = vec![100.0; 11];
        closes.push(200.0);
        let s = render_summary(&analysis_of(&closes));
        assert!(s.starts_with("Total: 1 anomalies (1 up, 0 down) in 12 points"));
    }
}
