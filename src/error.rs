use std::io;

use thiserror::Error;

/// Why an orchestration failed. Any of these abandons the remaining fetch
/// queue and discards already-fetched auxiliary results; the orchestration
/// fails as one unit and is never retried.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("could not fetch {file}: status {status}")]
    FetchFailed { file: String, status: u16 },

    #[error("could not fetch {file}")]
    Io { source: io::Error, file: String },

    #[error("malformed data payload from {file}")]
    MalformedData {
        source: serde_json::Error,
        file: String,
    },
}

impl OrchestrationError {
    pub(crate) fn fetch_failed(file: impl Into<String>, status: u16) -> Self {
        Self::FetchFailed {
            file: file.into(),
            status,
        }
    }

    pub(crate) fn io(source: io::Error, file: impl Into<String>) -> Self {
        Self::Io {
            source,
            file: file.into(),
        }
    }

    pub(crate) fn malformed_data(source: serde_json::Error, file: impl Into<String>) -> Self {
        Self::MalformedData {
            source,
            file: file.into(),
        }
    }
}
