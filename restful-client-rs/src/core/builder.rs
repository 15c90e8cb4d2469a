//! Client builder implementation
//!
//! Assembles a `RestfulClient` from a service directory and the pluggable
//! parts around it. Every part has a default:
//!
//! - health tracker: a `ServiceHealthRegistry` with every service registered
//! - transport: `ReqwestTransport`
//! - reporter: `LogReporter`

use std::path::PathBuf;
use std::sync::Arc;

use crate::client::RestfulClient;
use crate::config::{ClientSettings, ServiceConfig, ServiceDirectory};
use crate::error::{Result, ServiceError};
use crate::reporting::{LogReporter, Reporter};
use crate::resilience::{HealthTracker, ServiceHealthRegistry};
use crate::transport::{ReqwestTransport, Transport};

/// Builder for `RestfulClient`
#[derive(Default)]
pub struct ClientBuilder {
    /// Process-wide defaults, also used when loading `config_folder`
    settings: ClientSettings,

    /// Folder holding the directory file
    config_folder: Option<PathBuf>,

    /// Services added on top of whatever is loaded
    services: Vec<(String, ServiceConfig)>,

    health: Option<Arc<dyn HealthTracker>>,
    transport: Option<Arc<dyn Transport>>,
    reporter: Option<Arc<dyn Reporter>>,
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the process-wide settings
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Load services from the directory file in `folder`
    pub fn config_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.config_folder = Some(folder.into());
        self
    }

    /// Add a service at `base_url` using the builder's settings
    pub fn service(mut self, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = ServiceConfig::from_settings(base_url, &self.settings);
        self.services.push((name.into(), config));
        self
    }

    /// Add a fully configured service
    pub fn service_config(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        self.services.push((name.into(), config));
        self
    }

    pub fn health_tracker(mut self, health: Arc<dyn HealthTracker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an existing `reqwest::Client` for dispatch
    pub fn http_client(self, client: reqwest::Client) -> Self {
        self.transport(Arc::new(ReqwestTransport::with_client(client)))
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Resolve the directory and fill in defaults
    pub fn build(self) -> Result<RestfulClient> {
        self.settings.validate()?;

        let mut directory = match self.config_folder {
            Some(ref folder) => ServiceDirectory::load(folder, &self.settings)?,
            None => ServiceDirectory::new().with_legacy_postfix(self.settings.legacy_postfix.clone()),
        };

        for (name, config) in self.services {
            config.validate()?;
            directory.insert(name, config);
        }

        if directory.is_empty() {
            return Err(ServiceError::configuration("No services configured"));
        }

        let health = match self.health {
            Some(health) => health,
            None => {
                let registry = ServiceHealthRegistry::new();
                for (name, config) in directory.services() {
                    registry.register(name, config.health);
                }
                Arc::new(registry)
            }
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let reporter = self.reporter.unwrap_or_else(|| Arc::new(LogReporter));

        log::debug!("Built restful client for {} services", directory.len());

        Ok(RestfulClient::from_parts(directory, health, transport, reporter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StubTransport;

    #[test]
    fn test_build_requires_services() {
        let err = ClientBuilder::new()
            .transport(Arc::new(StubTransport::new()))
            .build()
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_build_rejects_invalid_url() {
        let result = ClientBuilder::new()
            .service("posts", "not a url")
            .transport(Arc::new(StubTransport::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_services_inherit_settings() {
        let settings = ClientSettings {
            retries: 7,
            user_agent: "users_service".to_string(),
            ..ClientSettings::default()
        };

        let client = ClientBuilder::new()
            .settings(settings)
            .service("posts", "http://localhost:8383/api/v1")
            .transport(Arc::new(StubTransport::new()))
            .build()
            .unwrap();

        let config = client.directory().resolve("posts").unwrap();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.user_agent, "users_service");
        assert_eq!(client.service_url("posts").unwrap(), "http://localhost:8383/api/v1");
    }
}
