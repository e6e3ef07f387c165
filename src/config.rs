//! Engine configuration.
//!
//! Settings are read from a priority chain of [`ConfigSource`]s, typically
//! the environment and an optional JSON file.

use std::collections::HashMap;
use std::env;

#[cfg(feature = "config")]
use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::{DiError, DiResult};

/// Environment prefix used by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_RESOLVE";

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ConfigValue {
    /// Try to convert to string
    pub fn as_string(&self) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(DiError::Config(format!("{other:?} is not a string"))),
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(DiError::Config(format!("{other:?} is not an integer"))),
        }
    }

    /// Try to convert to boolean; `0` and `1` are accepted as well
    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::Integer(0) => Ok(false),
            ConfigValue::Integer(1) => Ok(true),
            other => Err(DiError::Config(format!("{other:?} is not a boolean"))),
        }
    }

    fn parse(raw: String) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw)
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
///
/// Key `strict_dependencies` with prefix `APP` reads `APP_STRICT_DEPENDENCIES`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(ConfigValue::parse)
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory configuration source.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// JSON file configuration source
///
/// The file holds a flat object, for example
/// `{ "strict_dependencies": false }`. It is read on first access.
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    file_path: std::path::PathBuf,
    config: RwLock<Option<HashMap<String, ConfigValue>>>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    pub fn new(file_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            config: RwLock::new(None),
        }
    }

    /// Reload configuration from file
    pub fn reload(&self) -> DiResult<()> {
        let content = std::fs::read_to_string(&self.file_path)
            .map_err(|err| DiError::Config(format!("{}: {err}", self.file_path.display())))?;
        let parsed: HashMap<String, ConfigValue> = serde_json::from_str(&content)
            .map_err(|err| DiError::Config(format!("{}: {err}", self.file_path.display())))?;
        *self.config.write() = Some(parsed);
        Ok(())
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        if self.config.read().is_none() {
            if let Err(err) = self.reload() {
                tracing::warn!(%err, "configuration file unavailable");
                return None;
            }
        }
        self.config.read().as_ref()?.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.config
            .read()
            .as_ref()
            .map(|config| config.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Configuration sources in priority order: the first source holding a key
/// wins.
#[derive(Debug, Default)]
pub struct ConfigSources {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source (higher priority sources should be added first)
    pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Get a configuration value, checking sources in priority order
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    /// Get a boolean value, falling back to `default` when no source has it
    pub fn get_bool_or(&self, key: &str, default: bool) -> DiResult<bool> {
        match self.get(key) {
            Some(value) => value
                .as_bool()
                .map_err(|err| DiError::Config(format!("{key}: {err}"))),
            None => Ok(default),
        }
    }

    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|source| source.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Engine settings applied when a provider is built.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::config::{ConfigSources, ConfigValue, EngineConfig, MemoryConfigSource};
///
/// let sources = ConfigSources::new().add_source(
///     MemoryConfigSource::new().set("strict_dependencies", ConfigValue::Boolean(false)),
/// );
/// let config = EngineConfig::load(&sources).unwrap();
/// assert!(!config.strict_dependencies);
/// assert!(!config.trace_resolutions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Reject descriptors depending on unregistered keys when the provider is
    /// built. When off, such a dependency fails with `NotFound` once resolved.
    pub strict_dependencies: bool,
    /// Install a [`LoggingObserver`](crate::LoggingObserver) on every
    /// provider built with this config.
    pub trace_resolutions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_dependencies: true,
            trace_resolutions: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a set of sources
    pub fn load(sources: &ConfigSources) -> DiResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            strict_dependencies: sources.get_bool_or("strict_dependencies", defaults.strict_dependencies)?,
            trace_resolutions: sources.get_bool_or("trace_resolutions", defaults.trace_resolutions)?,
        })
    }

    /// Load configuration from `FERROUS_RESOLVE_*` environment variables
    pub fn from_env() -> DiResult<Self> {
        Self::load(&ConfigSources::new().add_source(EnvironmentConfigSource::with_prefix(ENV_PREFIX)))
    }
}
