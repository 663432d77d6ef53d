//! Error types for eventmap.

use thiserror::Error;

/// Errors that can occur while reconciling, geocoding or syncing events.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event source error: {0}")]
    Source(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Geocoder error: {0}")]
    Geocoder(String),

    #[error("Feature service error: {0}")]
    FeatureService(String),

    #[error("Duplicate event_id {id} in {origin} records")]
    DuplicateEventId { id: String, origin: &'static str },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for eventmap operations.
pub type SyncResult<T> = Result<T, SyncError>;
