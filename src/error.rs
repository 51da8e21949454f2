//! Front-end error types

use thiserror::Error;

/// Errors that can stop reading a capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PCAP parse error: {0}")]
    Pcap(String),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error(transparent)]
    Engine(#[from] usbll_engine::EngineError),
}
