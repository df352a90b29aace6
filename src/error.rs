use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source {source_id} failed: {message}")]
    Source { source_id: String, message: String },
}

impl CalendarError {
    pub fn source_failure(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        CalendarError::Source {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CalendarError>;
