//! Error type for ledger, queue and configuration operations
//!
//! Validation never produces these; rule failures are reported as verdicts.

use std::path::PathBuf;

/// Errors surfaced by the persistent stores and the collaborator layer
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reading or writing a store file failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store file exists but does not hold the expected JSON document
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a document before writing it failed
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The config file exists but could not be parsed
    #[error("Config error in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An ads or analytics collaborator failed to return data
    #[error("Provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
