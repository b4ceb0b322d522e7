//! Application configuration.
//!
//! Defaults live in constants; [`Config::from_env`] overrides them from
//! `TABCLEAN_*` environment variables (a `.env` file is loaded by the CLI
//! before this runs). Values that fail to parse keep their default and are
//! reported through the log broadcaster.

use std::env;

use crate::api::logs::log_warning;

/// HTTP port for `tabclean serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum upload size (in bytes).
///
/// 10 MB limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// File name offered for CSV downloads.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "processed_data.csv";

/// Rows per preview page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Sessions the HTTP server keeps before evicting the oldest.
pub const DEFAULT_MAX_SESSIONS: usize = crate::session::DEFAULT_MAX_SESSIONS;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub export_file_name: String,
    pub dynamic_typing: bool,
    pub page_size: usize,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            dynamic_typing: true,
            page_size: DEFAULT_PAGE_SIZE,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Config {
    /// Load configuration from `TABCLEAN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let export_file_name = lookup("TABCLEAN_EXPORT_FILE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.export_file_name);

        Self {
            port: parse_or(&lookup, "TABCLEAN_PORT", defaults.port),
            max_upload_bytes: parse_or(&lookup, "TABCLEAN_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            export_file_name,
            dynamic_typing: parse_or(&lookup, "TABCLEAN_DYNAMIC_TYPING", defaults.dynamic_typing),
            page_size: parse_or(&lookup, "TABCLEAN_PAGE_SIZE", defaults.page_size).max(1),
            max_sessions: parse_or(&lookup, "TABCLEAN_MAX_SESSIONS", defaults.max_sessions).max(1),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log_warning(format!("Ignoring {}='{}', using default {}", key, raw, default));
                default
            }
        },
    }
}
