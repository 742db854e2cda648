use crate::drive::DEFAULT_DRIVE_API_BASE;
use crate::error::{Error, Result};
use crate::export::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};
use crate::formatter::{DEFAULT_BATCH_SIZE, DEFAULT_TEMPLATE_TAB, FormatOptions};
use crate::gradebook::ExtractOptions;
use crate::rate_limiter::{DEFAULT_MAX_REQUESTS, DEFAULT_SAFETY_MARGIN, DEFAULT_WINDOW, RateLimiter};
use crate::sheets::{DEFAULT_DOCS_BASE, DEFAULT_SHEETS_API_BASE};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

pub const GOOGLE_TOKEN_VAR: &str = "GOOGLE_OAUTH_TOKEN";
pub const CANVAS_TOKEN_VAR: &str = "CANVAS_TOKEN";
pub const CANVAS_BASE_VAR: &str = "CANVAS_BASE_URL";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub max_polls: u32,
    pub poll_interval_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Run configuration. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sheets_api_base: String,
    pub drive_api_base: String,
    pub docs_base: String,
    pub template_tab: String,
    pub max_requests: usize,
    pub window_ms: u64,
    pub safety_margin_ms: u64,
    pub retry_fallback_ms: u64,
    pub duplicate_batch_size: usize,
    pub extract: ExtractOptions,
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheets_api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            docs_base: DEFAULT_DOCS_BASE.to_string(),
            template_tab: DEFAULT_TEMPLATE_TAB.to_string(),
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW.as_millis() as u64,
            safety_margin_ms: DEFAULT_SAFETY_MARGIN.as_millis() as u64,
            retry_fallback_ms: 60_000,
            duplicate_batch_size: DEFAULT_BATCH_SIZE,
            extract: ExtractOptions::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::with_margin(
            self.max_requests,
            Duration::from_millis(self.window_ms),
            Duration::from_millis(self.safety_margin_ms),
        )
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            template_tab: self.template_tab.clone(),
            batch_size: self.duplicate_batch_size,
        }
    }

    pub fn retry_fallback(&self) -> Duration {
        Duration::from_millis(self.retry_fallback_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.export.poll_interval_ms)
    }
}

static DOTENV: Once = Once::new();

/// Loads `.env` from the working directory (or a parent) into the process
/// environment, once. Variables already set keep their values.
pub fn load_env() {
    DOTENV.call_once(|| {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded {}", path.display());
        }
    });
}

/// Reads a required, non-blank variable from the environment or `.env`.
pub fn env_value(var: &str) -> Result<String> {
    load_env();
    require_token(env::var(var).ok(), var)
}

/// Rejects a missing or blank token.
pub fn require_token(value: Option<String>, name: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingCredential(format!("{name} is not set"))),
    }
}
