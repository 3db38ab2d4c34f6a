use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use serde::Deserialize;
use thiserror::Error;
use zscore_anomaly::{series_from_millis, AnomalyError, DetectorParams, PricePoint, ZScoreDetector};

/// Error wrapper for Python
#[derive(Error, Debug)]
enum PyAnomalyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Detector(#[from] AnomalyError),
}

impl From<PyAnomalyError> for PyErr {
    fn from(e: PyAnomalyError) -> PyErr {
        PyValueError::new_err(e.to_string())
    }
}

#[derive(Deserialize)]
struct JsonSeries {
    points: Vec<PricePoint>,
}

fn detector(window: usize, threshold: f64) -> Result<ZScoreDetector, PyAnomalyError> {
    Ok(ZScoreDetector::new(DetectorParams { window, threshold })?)
}

/// detect_anomalies(timestamps_ms: list[int], closes: list[float],
///                  window: int = 10, threshold: float = 2.0) -> list[dict]
/// Each dict: {"index", "timestamp_ms", "close", "z_score", "direction"}.
#[pyfunction]
#[pyo3(signature = (timestamps_ms, closes, window = 10, threshold = 2.0))]
fn detect_anomalies(
    py: Python<'_>,
    timestamps_ms: Vec<i64>,
    closes: Vec<f64>,
    window: usize,
    threshold: f64,
) -> PyResult<PyObject> {
    let points = series_from_millis(&timestamps_ms, &closes).map_err(PyAnomalyError::from)?;
    let anomalies = detector(window, threshold)?.detect(&points).map_err(PyAnomalyError::from)?;
    let out = PyList::empty(py);
    for a in anomalies {
        let d = PyDict::new(py);
        d.set_item("index", a.index)?;
        d.set_item("timestamp_ms", a.ts.timestamp_millis())?;
        d.set_item("close", a.close)?;
        d.set_item("z_score", a.z_score)?;
        d.set_item("direction", a.direction.label())?;
        out.append(d)?;
    }
    Ok(out.to_object(py))
}

/// analyze_json(json_str: str, window: int = 10, threshold: float = 2.0) -> str
/// Input: {"points": [{"ts": "<rfc3339>", "close": <float>}, ...]}.
/// Returns the full analysis as JSON.
#[pyfunction]
#[pyo3(signature = (json_str, window = 10, threshold = 2.0))]
fn analyze_json(json_str: &str, window: usize, threshold: f64) -> PyResult<String> {
    let series: JsonSeries = serde_json::from_str(json_str)
        .map_err(|e| PyAnomalyError::InvalidInput(format!("invalid json: {}", e)))?;
    let analysis =
        detector(window, threshold)?.analyze(&series.points).map_err(PyAnomalyError::from)?;
    let out = serde_json::to_string(&analysis)
        .map_err(|e| PyAnomalyError::InvalidInput(e.to_string()))?;
    Ok(out)
}

/// Python module
#[pymodule]
fn zscore_anomaly_py(_py: Python, m: &PyModule) -> PyResult<()> {
    let _ = env_logger::try_init();
    m.add_function(wrap_pyfunction!(detect_anomalies, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_json, m)?)?;
    Ok(())
}
