//! Plugin process configuration.
//!
//! A host starts a plugin with the plugin's path as the first argument and talks
//! to it over stdio. Everything else comes from the environment:
//!
//! - `NVPEER_LOG_FILE`: append logs to this file instead of stderr.
//! - `NVPEER_LOG`: a tracing filter directive such as `debug` or `nvpeer=trace`.

use std::path::PathBuf;

pub const LOG_FILE_ENV: &str = "NVPEER_LOG_FILE";
pub const LOG_FILTER_ENV: &str = "NVPEER_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConfig {
    /// Prefix of every service method this plugin registers.
    pub plugin_path: String,
    pub log_file: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl PeerConfig {
    /// Reads the process's own arguments and environment.
    pub fn from_env() -> Self {
        Self::from_parts(std::env::args(), |key| std::env::var(key).ok())
    }

    /// Builds a config from an argv (program name first) and an environment
    /// lookup. Empty variables count as unset.
    pub fn from_parts<I, F>(args: I, env: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.is_empty());
        Self {
            plugin_path: args.into_iter().nth(1).unwrap_or_default(),
            log_file: lookup(LOG_FILE_ENV).map(PathBuf::from),
            log_filter: lookup(LOG_FILTER_ENV),
        }
    }
}
