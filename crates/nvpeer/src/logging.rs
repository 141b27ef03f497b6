//! Logging setup using tracing.
//!
//! Stdout may be the wire, so logs go to a file or to stderr and never to stdout.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::PeerConfig;

/// Filter used when the configuration does not name one.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter for `config`, falling back to [`DEFAULT_FILTER`] when the
/// configured directive does not parse.
pub fn filter(config: &PeerConfig) -> EnvFilter {
    let directive = config.log_filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Call once at startup; later calls fail.
pub fn init(config: &PeerConfig) -> std::io::Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter(config))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(std::io::Error::other)
}
