use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("api error [{code}]: {description}")]
    Api { code: String, description: String },

    #[error("no data returned for {0}")]
    NoData(String),

    #[error("invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::Parse(e.to_string())
    }
}
