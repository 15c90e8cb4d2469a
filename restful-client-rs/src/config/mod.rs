//! Configuration management for the restful client
//!
//! Two layers:
//!
//! - `ClientSettings`: process-wide defaults (timeout, retries, user agent,
//!   circuit breaker switch, environment, legacy postfix), loadable from any
//!   `ConfigProvider`
//! - `ServiceDirectory`: one resolved `ServiceConfig` per named service,
//!   built programmatically or loaded from `restful_services.yml`

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::resilience::HealthOptions;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_USER_AGENT: &str = "RestfulClient - https://github.com/AvnerCohen/restful-client";
pub const DEFAULT_ENV_NAME: &str = "default";

/// Directory file names, in lookup order
pub const DIRECTORY_FILE_NAMES: [&str; 2] = ["restful_services.yml", "rest_api.yml"];

/// `${NAME}` or `${NAME:-default}` inside a directory file
static ENV_REFERENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok());

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Process-wide defaults applied to every service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub user_agent: String,
    pub use_circuit_breaker: bool,

    /// Section of the directory file to read
    pub env_name: String,

    /// Suffix appended to service names when looking them up
    pub legacy_postfix: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            use_circuit_breaker: true,
            env_name: DEFAULT_ENV_NAME.to_string(),
            legacy_postfix: String::new(),
        }
    }
}

impl ClientSettings {
    /// Load settings from a provider, falling back to defaults per key.
    ///
    /// Keys: `timeout_seconds`, `retries`, `user_agent`,
    /// `use_circuit_breaker`, `env_name`, `legacy_postfix`.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let timeout_seconds = provider.get_int_or("timeout_seconds", DEFAULT_TIMEOUT_SECS as i64);
        let retries = provider.get_int_or("retries", DEFAULT_RETRIES as i64);

        let settings = Self {
            timeout: Duration::from_secs(u64::try_from(timeout_seconds).map_err(|_| {
                ServiceError::configuration(format!("Negative timeout_seconds: {}", timeout_seconds))
            })?),
            retries: u32::try_from(retries)
                .map_err(|_| ServiceError::configuration(format!("Invalid retries: {}", retries)))?,
            user_agent: provider.get_string_or("user_agent", &defaults.user_agent),
            use_circuit_breaker: provider.get_bool_or("use_circuit_breaker", defaults.use_circuit_breaker),
            env_name: provider.get_string_or("env_name", &defaults.env_name),
            legacy_postfix: provider.get_string_or("legacy_postfix", &defaults.legacy_postfix),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `RESTFUL_CLIENT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&EnvConfigProvider::new().with_prefix("RESTFUL_CLIENT"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ServiceError::configuration("Timeout must be greater than zero"));
        }

        if self.user_agent.is_empty() {
            return Err(ServiceError::configuration("User agent is required"));
        }

        Ok(())
    }
}

/// Resolved settings for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub use_circuit_breaker: bool,
    pub health: HealthOptions,
}

impl ServiceConfig {
    /// A service at `base_url` using the default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_settings(base_url, &ClientSettings::default())
    }

    /// A service at `base_url` using the given process-wide settings
    pub fn from_settings(base_url: impl Into<String>, settings: &ClientSettings) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: settings.timeout,
            max_retries: settings.retries,
            user_agent: settings.user_agent.clone(),
            use_circuit_breaker: settings.use_circuit_breaker,
            health: HealthOptions::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn use_circuit_breaker(mut self, enabled: bool) -> Self {
        self.use_circuit_breaker = enabled;
        self
    }

    pub fn health(mut self, health: HealthOptions) -> Self {
        self.health = health;
        self
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid base URL {}: {}", self.base_url, e))
        })?;

        if self.timeout.is_zero() {
            return Err(ServiceError::configuration("Timeout must be greater than zero"));
        }

        if self.health.max_errors == 0 {
            return Err(ServiceError::configuration("max_errors must be greater than zero"));
        }

        Ok(())
    }
}

/// One entry of a directory file section
#[derive(Debug, Clone, Deserialize)]
struct ServiceEntry {
    url: Option<String>,
    timeout: Option<u64>,
    retries: Option<u32>,
    user_agent: Option<String>,
    time_window_in_seconds: Option<u64>,
    max_errors: Option<usize>,
    grace_period: Option<u64>,
}

impl ServiceEntry {
    fn into_config(self, url: String, settings: &ClientSettings) -> ServiceConfig {
        let defaults = HealthOptions::default();
        let mut config = ServiceConfig::from_settings(url, settings).health(HealthOptions {
            time_window: self
                .time_window_in_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.time_window),
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            grace_period: self
                .grace_period
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
        });

        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }

        config
    }
}

/// Maps service names to their resolved configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    services: HashMap<String, ServiceConfig>,
    legacy_postfix: String,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service under `name`
    pub fn with_service(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        self.insert(name, config);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, config: ServiceConfig) {
        self.services.insert(name.into(), config);
    }

    /// Set the suffix appended to names when resolving
    pub fn with_legacy_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.legacy_postfix = postfix.into();
        self
    }

    /// Load the directory file from `folder`.
    ///
    /// Reads the first of `restful_services.yml` / `rest_api.yml` found,
    /// takes the section named `settings.env_name` and keeps every entry
    /// with a `url`.
    pub fn load(folder: impl AsRef<Path>, settings: &ClientSettings) -> Result<Self> {
        settings.validate()?;

        let path = find_directory_file(folder.as_ref())?;
        log::debug!("Loading service directory from {}", path.display());

        let text = std::fs::read_to_string(&path).map_err(|e| {
            ServiceError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let text = expand_env_vars(&text)?;

        let file = config::Config::builder()
            .add_source(config::File::from_str(&text, config::FileFormat::Yaml))
            .build()?;

        let entries: HashMap<String, ServiceEntry> = file.get(&settings.env_name).map_err(|e| {
            ServiceError::configuration(format!(
                "Section '{}' missing or malformed in {}: {}",
                settings.env_name,
                path.display(),
                e
            ))
        })?;

        let mut directory = Self::new().with_legacy_postfix(settings.legacy_postfix.clone());

        for (name, entry) in entries {
            let Some(url) = entry.url.clone() else {
                log::debug!("Skipping {}: no url", name);
                continue;
            };

            let service_config = entry.into_config(url, settings);
            service_config.validate()?;
            directory.insert(name, service_config);
        }

        Ok(directory)
    }

    /// Resolve a service by its logical name
    pub fn resolve(&self, name: &str) -> Result<&ServiceConfig> {
        let key = format!("{}{}", name, self.legacy_postfix);

        self.services.get(&key).ok_or_else(|| {
            ServiceError::configuration(format!("Couldn't find ['{}'] in the service directory", key))
        })
    }

    /// Logical names (legacy postfix stripped) and configs of every service
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceConfig)> {
        self.services.iter().map(move |(key, config)| {
            let name = if self.legacy_postfix.is_empty() {
                key.as_str()
            } else {
                key.strip_suffix(self.legacy_postfix.as_str()).unwrap_or(key)
            };
            (name, config)
        })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn find_directory_file(folder: &Path) -> Result<PathBuf> {
    if !folder.is_dir() {
        return Err(ServiceError::configuration(format!(
            "Configuration directory not found: {}",
            folder.display()
        )));
    }

    DIRECTORY_FILE_NAMES
        .iter()
        .map(|name| folder.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            ServiceError::configuration(format!(
                "None of {:?} found in {}",
                DIRECTORY_FILE_NAMES,
                folder.display()
            ))
        })
}

/// Substitute environment references in a directory file before parsing.
/// A reference without a default to an unset variable is an error.
fn expand_env_vars(text: &str) -> Result<String> {
    let Some(pattern) = ENV_REFERENCE.as_ref() else {
        return Ok(text.to_string());
    };

    let mut expanded = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];

        let value = match (env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                return Err(ServiceError::configuration(format!(
                    "Environment variable {} referenced in the service directory is not set",
                    name
                )))
            }
        };

        expanded.push_str(&text[last..whole.start()]);
        expanded.push_str(&value);
        last = whole.end();
    }

    expanded.push_str(&text[last..]);
    Ok(expanded)
}
