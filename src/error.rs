//! Error types for Vacancy Relay.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors. Fatal at startup only — the process must
/// not register any listener with an incomplete configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    /// Another live process is polling the same session token. Two
    /// processes must never share one transport session, so this is a
    /// deliberate fatal stop.
    #[error("Channel {name}: session is already in use by another process")]
    SessionConflict { name: String },
}

/// Language-model classification errors. Never fatal for a run — the
/// coordinator degrades these to the not-a-vacancy sentinel.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Classification timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Per-run pipeline errors. Contained to one message's run; the listener
/// and other in-flight runs continue.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Publish failed: {0}")]
    Publish(#[from] ChannelError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
