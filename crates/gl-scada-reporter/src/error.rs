//! Reporter error taxonomy.

use thiserror::Error;

use gl_mqtt_session::SessionError;

/// Errors that can occur while building or delivering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The reporter configuration cannot deliver reports at all.
    #[error("configuration error: {0}")]
    Config(String),

    /// More data sources than one report may carry.
    #[error("a report can carry at most {max} data sources, got {count}")]
    TooManyDataSources { max: usize, count: usize },

    /// A dimension was given an empty name or value.
    #[error("dimension name and value must be non-empty")]
    EmptyDimension,

    /// The HTTPS request never produced a response.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The MQTT session failed to publish.
    #[error("mqtt transport error: {0}")]
    Transport(#[from] SessionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for reporter results.
pub type ReportResult<T> = Result<T, ReportError>;
