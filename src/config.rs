//! Runtime configuration.
//!
//! Every value has a default matching the backend web client, so an empty
//! (or absent) TOML file is a valid configuration. `DISCUSSION_VIEWER_BASE_URL`
//! overrides the file's `base_url`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

pub const BASE_URL_ENV: &str = "DISCUSSION_VIEWER_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Backend origin, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Where the token / remembered login are persisted. Defaults to the
    /// platform config directory.
    pub credentials_path: Option<PathBuf>,
    pub poll: PollConfig,
    pub progress: ProgressConfig,
    pub animation: AnimationConfig,
    pub scroll: ScrollConfig,
    pub http: HttpConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            credentials_path: None,
            poll: PollConfig::default(),
            progress: ProgressConfig::default(),
            animation: AnimationConfig::default(),
            scroll: ScrollConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Main discussion poller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Consecutive failures after which the session gives up.
    pub max_attempts: u32,
    /// Multiplier applied to the interval after each consecutive failure.
    /// `1.0` keeps a fixed cadence.
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            max_attempts: 5,
            backoff_factor: 1.0,
            max_interval_ms: 30_000,
        }
    }
}

/// Orchestration progress polling (runs before the first round).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: u64,
    pub max_polls: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_polls: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enabled: bool,
    /// Lower bound of the "composing" pause before a regular turn.
    pub typing_delay_min_ms: u64,
    pub typing_delay_max_ms: u64,
    /// Pause between reveal steps.
    pub reveal_step_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            typing_delay_min_ms: 1_500,
            typing_delay_max_ms: 2_500,
            reveal_step_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub bottom_threshold_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            bottom_threshold_px: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3_000,
            request_timeout_ms: 15_000,
        }
    }
}

impl ViewerConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: ViewerConfig =
            toml::from_str(text).map_err(|e| ViewerError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path` when given (a missing explicit file is an error),
    /// then apply the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    ViewerError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                cfg.base_url = url;
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ViewerError::Config("base_url must not be empty".into()));
        }
        if self.poll.max_attempts == 0 {
            return Err(ViewerError::Config("poll.max_attempts must be at least 1".into()));
        }
        if self.poll.interval_ms == 0 || self.progress.interval_ms == 0 {
            return Err(ViewerError::Config("poll intervals must be non-zero".into()));
        }
        if self.poll.backoff_factor.is_nan() || self.poll.backoff_factor < 1.0 {
            return Err(ViewerError::Config("poll.backoff_factor must be >= 1.0".into()));
        }
        if self.animation.typing_delay_min_ms > self.animation.typing_delay_max_ms {
            return Err(ViewerError::Config(
                "animation.typing_delay_min_ms exceeds typing_delay_max_ms".into(),
            ));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_root(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path.clone().unwrap_or_else(default_credentials_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.http.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }
}

pub fn default_credentials_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("discussion-viewer")
        .join("credentials.toml")
}
