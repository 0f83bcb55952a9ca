use thiserror::Error;

/// Main error type for the scoreboard monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Data source errors
    #[error("Scoreboard unavailable: {0}")]
    SourceUnavailable(String),

    // Persistence errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("No data: {0}")]
    NotFound(String),

    // Notification errors
    #[error("Notification failed: {0}")]
    Notification(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MonitorError {
    /// Store queries that matched nothing ("no data yet")
    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::NotFound(_))
    }

    /// Append/query failures of the time-series store
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            MonitorError::Persistence(_) | MonitorError::Database(_)
        )
    }

    /// Errors that must stop the process before the loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::Config(_) | MonitorError::InvalidConfig(_)
        )
    }
}

/// Result type alias for MonitorError
pub type Result<T> = std::result::Result<T, MonitorError>;
