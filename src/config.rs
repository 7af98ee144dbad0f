//! Runbook Configuration Module
//!
//! Reporter settings stored in `~/.config/runbook/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (`--initial-delay-ms`, `--poll-interval-ms`)
//! 2. Environment variables (`RUNBOOK_INITIAL_DELAY_MS`, `RUNBOOK_POLL_INTERVAL_MS`)
//! 3. Config file
//! 4. Fallbacks chosen by the caller

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunbookError};
use crate::report::{ReportFilter, ReporterConfig};

pub const ENV_INITIAL_DELAY: &str = "RUNBOOK_INITIAL_DELAY_MS";
pub const ENV_POLL_INTERVAL: &str = "RUNBOOK_POLL_INTERVAL_MS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunbookConfig {
    #[serde(default)]
    pub reporter: ReporterSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReporterSection {
    pub initial_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub first_failure_only: bool,
    pub filter: Option<ReportFilter>,
    pub on_failure: Option<ReportFilter>,
}

impl RunbookConfig {
    /// Returns `~/.config/runbook/` on Unix, `%APPDATA%/runbook/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runbook")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Missing file yields the empty config; a malformed one is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RunbookError::ConfigError {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| RunbookError::ConfigError {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Merge environment overrides
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(ms) = env_millis(ENV_INITIAL_DELAY)? {
            self.reporter.initial_delay_ms = Some(ms);
        }
        if let Some(ms) = env_millis(ENV_POLL_INTERVAL)? {
            self.reporter.poll_interval_ms = Some(ms);
        }
        Ok(self)
    }

    /// Resolve reporter settings, `fallback` filling unset timings
    pub fn reporter_config(&self, fallback_delay: Duration, fallback_poll: Duration) -> ReporterConfig {
        let section = &self.reporter;
        let mut config = ReporterConfig::new(
            section
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback_delay),
            section
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback_poll),
        );
        config.first_failure_only = section.first_failure_only;
        if let Some(filter) = section.filter {
            config.filter = filter;
        }
        if let Some(on_failure) = section.on_failure {
            config.on_failure = on_failure;
        }
        config
    }
}

fn env_millis(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RunbookError::ConfigError {
                reason: format!("{} must be milliseconds: {}", name, e),
            }),
        _ => Ok(None),
    }
}
