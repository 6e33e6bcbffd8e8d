//! Error types for the Roku discovery and config merge pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Device discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no Roku device responded to discovery")]
    NoDeviceFound,

    #[error("SSDP search failed: {0}")]
    Ssdp(#[from] std::io::Error),

    #[error("device request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected device response: {0}")]
    InvalidResponse(String),
}

/// Errors loading a configuration document referenced by path
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors while merging into the persisted config file.
///
/// Returned rather than swallowed so callers decide the failure policy;
/// the CLI logs-and-continues, tests assert on the variant.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write merged config to {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize merged config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not resolve a home directory for the persisted config")]
    NoHomeDir,
}
