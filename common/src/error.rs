use thiserror::Error;

/// Failures reported by the realtime database to a listener or a writer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("Permission denied at {path}")]
    PermissionDenied { path: String },

    #[error("Listener at {path} was cancelled")]
    Cancelled { path: String },

    #[error("Write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Transport unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    #[error("transport setup failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}
