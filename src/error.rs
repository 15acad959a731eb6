//! Error types for Case Companion.

/// Top-level error type for host startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Local key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ingestion pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("Invalid file type for {name} ({mime_type}): expected a .zip archive")]
    InvalidInputType { name: String, mime_type: String },
}

/// Onboarding wizard errors.
///
/// None of these are fatal: the wizard stays on its current step and the
/// caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Cannot apply {event} while on step {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Invite code must be at least {min_len} characters")]
    InvalidInviteCode { min_len: usize },

    #[error("Invite code {code} could not be resolved: {reason}")]
    InviteResolutionFailed { code: String, reason: String },

    #[error("Fields are not editable on step {step}")]
    FieldsNotEditable { step: String },

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
