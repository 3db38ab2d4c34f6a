use chrono::{DateTime, Utc};
use zscore_anomaly::{Analysis, Anomaly, Direction};

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub title: String,
    pub width: usize,
    pub height: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions {
            title: "BTC-USD Close Price with Anomaly Detection".to_string(),
            width: 96,
            height: 20,
        }
    }
}

const LABEL_WIDTH: usize = 12;

/// Clock time only when the series fits in one calendar day, date and time otherwise.
pub fn axis_time_format(first: DateTime<Utc>, last: DateTime<Utc>) -> &'static str {
    let num_days = (last - first).num_days() + 1;
    if num_days <= 1 {
        "%I:%M %p"
    } else {
        "%b %d, %I:%M %p"
    }
}

struct Column {
    close: f64,
    marker: Option<Direction>,
}

/// Points are bucketed into at most `width` columns; a column shows its last close and,
/// if any anomaly falls in it, the direction of the strongest one.
fn columns(analysis: &Analysis, width: usize) -> Vec<Column> {
    let n = analysis.points.len();
    let width = width.clamp(1, n);
    let mut cols = Vec::with_capacity(width);
    let mut anomalies = analysis.anomalies.iter().peekable();
    for c in 0..width {
        let start = c * n / width;
        let end = (c + 1) * n / width;
        let mut strongest: Option<&Anomaly> = None;
        while let Some(a) = anomalies.peek() {
            if a.index >= end {
                break;
            }
            if a.index >= start && strongest.map_or(true, |s| a.z_score.abs() > s.z_score.abs()) {
                strongest = Some(a);
            }
            anomalies.next();
        }
        cols.push(Column {
            close: analysis.points[end - 1].close,
            marker: strongest.map(|a| a.direction),
        });
    }
    cols
}

pub fn render_chart(analysis: &Analysis, opts: &ChartOptions) -> String {
    let mut out = format!("{}\n{}\n", opts.title, "=".repeat(opts.title.chars().count()));
    let (first, last) = match (analysis.points.first(), analysis.points.last()) {
        (Some(f), Some(l)) => (f.ts, l.ts),
        _ => {
            out.push_str("No price data to chart.\n");
            return out;
        }
    };

    let cols = columns(analysis, opts.width);
    let height = opts.height.max(2);
    let lo = cols.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);
    let hi = cols.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    let row_of = |v: f64| -> usize {
        if span <= 0.0 {
            height / 2
        } else {
            (((hi - v) / span) * (height - 1) as f64).round() as usize
        }
    };

    let mut grid = vec![vec![' '; cols.len()]; height];
    for (x, col) in cols.iter().enumerate() {
        if col.marker.is_some() {
            // dashed guide through the whole column
            for (y, row) in grid.iter_mut().enumerate() {
                if y % 2 == 0 {
                    row[x] = ':';
                }
            }
        }
        grid[row_of(col.close)][x] = match col.marker {
            Some(Direction::Up) => '^',
            Some(Direction::Down) => 'v',
            None => '*',
        };
    }

    for (y, row) in grid.iter().enumerate() {
        let label = if y == 0 {
            format!("{:>w$.2}", hi, w = LABEL_WIDTH)
        } else if y == height - 1 {
            format!("{:>w$.2}", lo, w = LABEL_WIDTH)
        } else {
            " ".repeat(LABEL_WIDTH)
        };
        out.push_str(&label);
        out.push_str(" |");
        out.extend(row.iter());
        out.push('\n');
    }
    out.push_str(&" ".repeat(LABEL_WIDTH));
    out.push_str(" +");
    out.push_str(&"-".repeat(cols.len()));
    out.push('\n');

    let fmt = axis_time_format(first, last);
    let left = first.format(fmt).to_string();
    let right = last.format(fmt).to_string();
    let gap = cols.len().saturating_sub(left.len() + right.len()).max(1);
    out.push_str(&" ".repeat(LABEL_WIDTH + 2));
    out.push_str(&left);
    out.push_str(&" ".repeat(gap));
    out.push_str(&right);
    out.push('\n');
    out.push_str("  * close   ^ price spike (up)   v price drop (down)   : anomaly\n");
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use zscore_anomaly::{DetectorParams, PricePoint, ZScoreDetector};

    pub(crate) fn analysis_of(closes: &[f64]) -> Analysis {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let pts: Vec<PricePoint> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + Duration::minutes(5 * i as i64), *c))
            .collect();
        ZScoreDetector::new(DetectorParams::default()).unwrap().analyze(&pts).unwrap()
    }

    #[test]
    fn same_day_uses_clock_time() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 23, 55, 0).unwrap();
        assert_eq!(axis_time_format(a, b), "%I:%M %p");
        // under 24h apart still counts as one day
        let c = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(axis_time_format(a, c), "%I:%M %p");
        let d = Utc.with_ymd_and_hms(2024, 3, 3, 0, 5, 0).unwrap();
        assert_eq!(axis_time_format(a, d), "%b %d, %I:%M %p");
    }

    #[test]
    fn marks_spike_column() {
        let mut closes = vec![100.0; 11];
        closes.push(200.0);
        let out = render_chart(&analysis_of(&closes), &ChartOptions::default());
        assert!(out.starts_with("BTC-USD Close Price with Anomaly Detection\n"));
        let plot: String = out.lines().filter(|l| l.contains(" |")).collect();
        assert_eq!(plot.matches('^').count(), 1);
        assert_eq!(plot.matches('v').count(), 0);
        assert!(out.contains("200.00"));
        assert!(out.contains("100.00"));
        assert!(out.contains("09:00 AM"));
    }

    #[test]
    fn narrow_chart_buckets_points() {
        let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 3) as f64).collect();
        closes.push(400.0);
        let opts = ChartOptions { width: 20, height: 8, ..ChartOptions::default() };
        let out = render_chart(&analysis_of(&closes), &opts);
        let plot_rows: Vec<&str> = out.lines().filter(|l| l.contains(" |")).collect();
        assert_eq!(plot_rows.len(), 8);
        assert!(plot_rows.iter().all(|l| l.split(" |").nth(1).unwrap().chars().count() == 20));
        assert!(out.contains('^'));
    }

    #[test]
    fn empty_analysis() {
        let empty = Analysis::empty(DetectorParams::default());
        let out = render_chart(&empty, &ChartOptions::default());
        assert!(out.ends_with("No price data to chart.\n"));
    }
}
