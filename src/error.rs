//! Error types.

use std::path::PathBuf;

/// An error raised while reading a network description.
///
/// These never escape a network load; they are logged and the load
/// degrades to whatever geometry was parsed before the failure.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("cannot read network file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed network XML at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed attribute on <{element}>: {reason}")]
    Attribute { element: String, reason: String },

    #[error("parser worker failed: {0}")]
    Worker(String),
}

/// An error raised while loading a [ViewConfig](crate::ViewConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
