use log::debug;
use serde::Serialize;
use std::io::Write;
use zscore_anomaly::Analysis;

use crate::ReportError;

#[derive(Serialize)]
struct CsvRow<'a> {
    ts: String,
    close: f64,
    #[serde(rename = "return")]
    ret: Option<f64>,
    mean: Option<f64>,
    std: Option<f64>,
    z: Option<f64>,
    anomaly: Option<&'a str>,
}

/// One row per point; undefined values are empty cells.
pub fn write_csv<W: Write>(analysis: &Analysis, writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut anomalies = analysis.anomalies.iter().peekable();
    for (i, p) in analysis.points.iter().enumerate() {
        let anomaly = match anomalies.peek() {
            Some(a) if a.index == i => anomalies.next().map(|a| a.direction.label()),
            _ => None,
        };
        wtr.serialize(CsvRow {
            ts: p.ts.to_rfc3339(),
            close: p.close,
            ret: p.ret,
            mean: p.mean,
            std: p.std,
            z: p.z,
            anomaly,
        })?;
    }
    wtr.flush()?;
    debug!("wrote {} csv rows", analysis.points.len());
    Ok(())
}

pub fn write_json<W: Write>(analysis: &Analysis, writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(writer, analysis)?;
    Ok(())
}
