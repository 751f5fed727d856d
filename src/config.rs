use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::compress::CompressionSettings;
use crate::ingest::Facing;
use crate::upload::UploadPolicy;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_BUDGET_SECS: u64 = 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_DIMENSION: u32 = 1024;
const DEFAULT_QUALITY: f32 = 0.7;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ALERTS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct ClientConfigFile {
    base_url: Option<String>,
    upload: Option<UploadConfigFile>,
    compression: Option<CompressionConfigFile>,
    camera: Option<CameraConfigFile>,
    health_timeout_secs: Option<u64>,
    alerts_timeout_secs: Option<u64>,
    theme: Option<Theme>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    attempt_timeout_secs: Option<u64>,
    total_budget_secs: Option<u64>,
    max_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CompressionConfigFile {
    max_dimension: Option<u32>,
    quality: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    facing: Option<Facing>,
}

/// Display theme preference. Read once at startup, changed only through
/// [`ClientConfig::set_theme`].
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme '{}'; expected light or dark", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub upload: UploadPolicy,
    pub compression: CompressionSettings,
    pub facing: Facing,
    pub health_timeout: Duration,
    pub alerts_timeout: Duration,
    theme: Theme,
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WASTEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configuration for a given origin with every other setting at its default.
    pub fn for_base_url(base_url: &str) -> Result<Self> {
        let mut cfg = Self::from_file(ClientConfigFile {
            base_url: Some(base_url.to_string()),
            ..ClientConfigFile::default()
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Point the client at a different origin, keeping every other setting.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.base_url = parse_base_url(base_url)?;
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn from_file(file: ClientConfigFile) -> Result<Self> {
        let base_url = parse_base_url(
            file.base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL),
        )?;
        let upload = UploadPolicy {
            attempt_timeout: Duration::from_secs(
                file.upload
                    .as_ref()
                    .and_then(|upload| upload.attempt_timeout_secs)
                    .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            ),
            total_budget: Duration::from_secs(
                file.upload
                    .as_ref()
                    .and_then(|upload| upload.total_budget_secs)
                    .unwrap_or(DEFAULT_UPLOAD_BUDGET_SECS),
            ),
            max_attempts: file
                .upload
                .as_ref()
                .and_then(|upload| upload.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_delay: Duration::from_millis(
                file.upload
                    .as_ref()
                    .and_then(|upload| upload.retry_delay_ms)
                    .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
        };
        let compression = CompressionSettings {
            max_dimension: file
                .compression
                .as_ref()
                .and_then(|compression| compression.max_dimension)
                .unwrap_or(DEFAULT_MAX_DIMENSION),
            quality: file
                .compression
                .as_ref()
                .and_then(|compression| compression.quality)
                .unwrap_or(DEFAULT_QUALITY),
        };
        let facing = file
            .camera
            .and_then(|camera| camera.facing)
            .unwrap_or_default();
        Ok(Self {
            base_url,
            upload,
            compression,
            facing,
            health_timeout: Duration::from_secs(
                file.health_timeout_secs
                    .unwrap_or(DEFAULT_HEALTH_TIMEOUT_SECS),
            ),
            alerts_timeout: Duration::from_secs(
                file.alerts_timeout_secs
                    .unwrap_or(DEFAULT_ALERTS_TIMEOUT_SECS),
            ),
            theme: file.theme.unwrap_or_default(),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var("WASTEWATCH_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.base_url = parse_base_url(&base_url)?;
            }
        }
        if let Ok(secs) = std::env::var("WASTEWATCH_ATTEMPT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                anyhow!("WASTEWATCH_ATTEMPT_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.upload.attempt_timeout = Duration::from_secs(secs);
        }
        if let Ok(secs) = std::env::var("WASTEWATCH_UPLOAD_BUDGET_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                anyhow!("WASTEWATCH_UPLOAD_BUDGET_SECS must be an integer number of seconds")
            })?;
            self.upload.total_budget = Duration::from_secs(secs);
        }
        if let Ok(attempts) = std::env::var("WASTEWATCH_MAX_ATTEMPTS") {
            self.upload.max_attempts = attempts
                .trim()
                .parse()
                .map_err(|_| anyhow!("WASTEWATCH_MAX_ATTEMPTS must be a positive integer"))?;
        }
        if let Ok(delay) = std::env::var("WASTEWATCH_RETRY_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("WASTEWATCH_RETRY_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.upload.retry_delay = Duration::from_millis(millis);
        }
        if let Ok(theme) = std::env::var("WASTEWATCH_THEME") {
            if !theme.trim().is_empty() {
                self.theme = theme.parse()?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.upload.max_attempts == 0 {
            return Err(anyhow!("upload.max_attempts must be at least 1"));
        }
        if self.upload.attempt_timeout.is_zero() {
            return Err(anyhow!("upload.attempt_timeout_secs must be greater than zero"));
        }
        if self.upload.total_budget.is_zero() {
            return Err(anyhow!("upload.total_budget_secs must be greater than zero"));
        }
        if !(self.compression.quality > 0.0 && self.compression.quality <= 1.0) {
            return Err(anyhow!("compression.quality must be in (0, 1]"));
        }
        if self.compression.max_dimension == 0 {
            return Err(anyhow!("compression.max_dimension must be at least 1"));
        }
        if self.health_timeout.is_zero() || self.alerts_timeout.is_zero() {
            return Err(anyhow!("request timeouts must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    // Url::join drops the last path segment unless it ends with '/'.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&normalized)
        .map_err(|e| anyhow!("invalid base url '{}': {}", trimmed, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!(
            "unsupported base url scheme '{}'; expected http(s)",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}
