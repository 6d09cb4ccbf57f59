//! Configuration system (layered: code > env > config file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::models::ModelSettings;

/// Default time a query may run before it is cancelled.
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 120;

/// Longest accepted response timeout (one day).
pub const MAX_RESPONSE_TIMEOUT_SECS: u64 = 86_400;

/// Settings shared by every model on one AI service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service endpoint for caller-supplied transports. The engine itself
    /// never reads it; providers built from this config do.
    pub base_url: Option<String>,
    pub response_timeout_secs: u64,
    pub response_streaming: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            response_streaming: true,
        }
    }
}

impl ServiceSettings {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    service: ServiceSettings,
    #[serde(default)]
    models: Vec<ModelSettings>,
}

/// Layered configuration for the query engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    service: Arc<RwLock<ServiceSettings>>,
    models: Arc<RwLock<HashMap<String, ModelSettings>>>,
}

impl EngineConfig {
    /// Create config with default service settings and no models.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    ///
    /// ```toml
    /// [service]
    /// response_timeout_secs = 60
    ///
    /// [[models]]
    /// name = "o3-pro"
    /// endpoint_type = "response_api"
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(input)?;
        let config = Self::new();
        config.set_service(file.service);
        for model in file.models {
            config.set_model(model);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading engine config");
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Platform config location, e.g. `~/.config/aiquery/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "aiquery")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from environment variables (AIQUERY_BASE_URL, etc.).
    pub fn from_env() -> Self {
        let config = Self::new();
        config.apply_env();
        config
    }

    /// Config file at the default path (if present) overlaid by the environment.
    pub fn load_default() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::new(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay environment variables onto the current settings.
    pub fn apply_env(&self) {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut service = self.service();

        if let Ok(url) = std::env::var("AIQUERY_BASE_URL") {
            service.base_url = Some(url);
        }
        if let Ok(raw) = std::env::var("AIQUERY_RESPONSE_TIMEOUT") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if (1..=MAX_RESPONSE_TIMEOUT_SECS).contains(&secs) => {
                    service.response_timeout_secs = secs
                }
                Ok(secs) => warn!(
                    value = secs,
                    max = MAX_RESPONSE_TIMEOUT_SECS,
                    "Ignoring out-of-range AIQUERY_RESPONSE_TIMEOUT"
                ),
                Err(e) => warn!(value = raw.as_str(), error = %e, "Ignoring AIQUERY_RESPONSE_TIMEOUT"),
            }
        }
        if let Ok(raw) = std::env::var("AIQUERY_RESPONSE_STREAMING") {
            match parse_bool(&raw) {
                Some(flag) => service.response_streaming = flag,
                None => warn!(value = raw.as_str(), "Ignoring AIQUERY_RESPONSE_STREAMING"),
            }
        }

        self.set_service(service);
    }

    pub fn service(&self) -> ServiceSettings {
        self.service
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_service(&self, settings: ServiceSettings) {
        *self.service.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn set_response_timeout(&self, timeout: Duration) {
        self.service
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .response_timeout_secs = timeout.as_secs();
    }

    pub fn set_response_streaming(&self, enabled: bool) {
        self.service
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .response_streaming = enabled;
    }

    pub fn set_model(&self, settings: ModelSettings) {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(settings.name.clone(), settings);
    }

    pub fn model(&self, name: &str) -> Option<ModelSettings> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Configured settings, or settings detected from the name.
    pub fn model_or_detected(&self, name: &str) -> ModelSettings {
        self.model(name)
            .unwrap_or_else(|| ModelSettings::detected(name))
    }

    /// Input-token budget for a model: configured override, else heuristic.
    pub fn max_input_tokens(&self, name: &str) -> u32 {
        self.model_or_detected(name).effective_max_input_tokens()
    }

    /// Validate that the settings can run queries.
    pub fn validate(&self) -> Result<()> {
        let service = self.service();
        if service.response_timeout_secs == 0 {
            return Err(QueryError::Configuration(
                "response_timeout_secs must be greater than zero".into(),
            ));
        }
        if service.response_timeout_secs > MAX_RESPONSE_TIMEOUT_SECS {
            return Err(QueryError::Configuration(format!(
                "response_timeout_secs must be at most {MAX_RESPONSE_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
