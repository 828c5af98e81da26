//! Configuration loader and validator for the blog UI.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::circuit::CircuitPolicy;
use crate::model::DEFAULT_PAGE_SIZE;
use crate::query::QueryKind;

/// Environment variable that replaces `api.url` when set.
pub const API_URL_ENV: &str = "BLOG_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub api: Api,
    #[serde(default)]
    pub circuit: Circuit,
}

/// HTTP front settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub bind: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
}

/// Upstream catalog API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub url: String,
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Api {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.url.trim())
            .map_err(|_| ConfigError::Invalid("api.url must be a valid URL"))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::Invalid("api.url must be an http(s) URL"));
        }
        Ok(url)
    }
}

/// Circuit breaker defaults plus per-query-kind overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Circuit {
    pub failure_threshold: u32,
    pub failure_rate_threshold: f64,
    pub window_size: usize,
    pub minimum_calls: usize,
    pub cooldown_ms: u64,
    #[serde(default)]
    pub overrides: HashMap<QueryKind, CircuitOverride>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: 0.5,
            window_size: 20,
            minimum_calls: 20,
            cooldown_ms: 5_000,
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitOverride {
    pub failure_threshold: Option<u32>,
    pub failure_rate_threshold: Option<f64>,
    pub window_size: Option<usize>,
    pub minimum_calls: Option<usize>,
    pub cooldown_ms: Option<u64>,
}

impl Circuit {
    pub fn defaults(&self) -> CircuitPolicy {
        CircuitPolicy {
            failure_threshold: self.failure_threshold,
            failure_rate_threshold: self.failure_rate_threshold,
            window_size: self.window_size,
            minimum_calls: self.minimum_calls,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }

    /// Effective policy for one query kind: defaults with any override applied.
    pub fn policy_for(&self, kind: QueryKind) -> CircuitPolicy {
        let mut policy = self.defaults();
        if let Some(o) = self.overrides.get(&kind) {
            if let Some(v) = o.failure_threshold {
                policy.failure_threshold = v;
            }
            if let Some(v) = o.failure_rate_threshold {
                policy.failure_rate_threshold = v;
            }
            if let Some(v) = o.window_size {
                policy.window_size = v;
            }
            if let Some(v) = o.minimum_calls {
                policy.minimum_calls = v;
            }
            if let Some(v) = o.cooldown_ms {
                policy.cooldown = Duration::from_millis(v);
            }
        }
        policy
    }
}

impl Config {
    /// Replace `api.url` with a non-blank value from the environment.
    pub fn apply_api_url_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.api.url = url;
        }
    }
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

fn default_user_agent() -> String {
    format!("blog-ui/{}", env!("CARGO_PKG_VERSION"))
}

/// Load configuration from a YAML file, apply `BLOG_API_URL`, and validate.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.bind.trim().is_empty() {
        return Err(ConfigError::Invalid("app.bind must be non-empty"));
    }
    if cfg.app.default_page_size <= 0 {
        return Err(ConfigError::Invalid("app.default_page_size must be > 0"));
    }

    if cfg.api.url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.url must be non-empty"));
    }
    cfg.api.base_url()?;
    if cfg.api.timeout_ms == 0 {
        return Err(ConfigError::Invalid("api.timeout_ms must be > 0"));
    }

    validate_policy(&cfg.circuit.defaults(), false)?;
    for kind in cfg.circuit.overrides.keys() {
        validate_policy(&cfg.circuit.policy_for(*kind), true)?;
    }
    Ok(())
}

fn validate_policy(policy: &CircuitPolicy, overridden: bool) -> Result<(), ConfigError> {
    let invalid = |default_msg, override_msg| {
        Err(ConfigError::Invalid(if overridden {
            override_msg
        } else {
            default_msg
        }))
    };

    if policy.failure_threshold == 0 {
        return invalid(
            "circuit.failure_threshold must be > 0",
            "circuit.overrides: failure_threshold must be > 0",
        );
    }
    if !(policy.failure_rate_threshold > 0.0 && policy.failure_rate_threshold <= 1.0) {
        return invalid(
            "circuit.failure_rate_threshold must be in (0, 1]",
            "circuit.overrides: failure_rate_threshold must be in (0, 1]",
        );
    }
    if policy.window_size == 0 {
        return invalid(
            "circuit.window_size must be > 0",
            "circuit.overrides: window_size must be > 0",
        );
    }
    if policy.minimum_calls > policy.window_size {
        return invalid(
            "circuit.minimum_calls must be <= circuit.window_size",
            "circuit.overrides: minimum_calls must be <= window_size",
        );
    }
    if policy.cooldown.is_zero() {
        return invalid(
            "circuit.cooldown_ms must be > 0",
            "circuit.overrides: cooldown_ms must be > 0",
        );
    }
    Ok(())
}

/// Returns the canonical example YAML.
pub fn example() -> &'static str {
    r#"app:
  bind: "127.0.0.1:8081"
  default_page_size: 10

api:
  url: "http://localhost:8080"
  timeout_ms: 1000
  user_agent: "blog-ui/0.1"

circuit:
  failure_threshold: 5
  failure_rate_threshold: 0.5
  window_size: 20
  minimum_calls: 20
  cooldown_ms: 5000
  overrides:
    by_id:
      failure_threshold: 3
"#
}
