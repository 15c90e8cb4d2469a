//! Tests for service directory loading
//!
//! These tests write directory files to a scratch folder and load them
//! through `ServiceDirectory::load` and the client builder.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::client::RestfulClient;
    use crate::config::{
        ClientSettings, ConfigProvider, ConfigProviderExt, EnvConfigProvider, ServiceDirectory, DEFAULT_USER_AGENT,
    };
    use crate::resilience::HealthOptions;
    use crate::transport::StubTransport;

    const SERVICES_YAML: &str = r#"
default:
  posts:
    url: http://localhost:8383/api/v1/
    timeout: 2
  users:
    url: http://localhost:7711/api/v0/
    retries: 5
    user_agent: users_service
    max_errors: 3
    time_window_in_seconds: 5
    grace_period: 30
  no_url:
    timeout: 1
production:
  posts:
    url: http://posts.internal/api/v1
"#;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("restful-client-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn write(&self, name: &str, contents: &str) -> &Self {
            fs::write(self.0.join(name), contents).unwrap();
            self
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_load_default_section() {
        let dir = ScratchDir::new();
        dir.write("restful_services.yml", SERVICES_YAML);

        let directory = ServiceDirectory::load(&dir.0, &ClientSettings::default()).unwrap();

        assert_eq!(directory.len(), 2);

        let posts = directory.resolve("posts").unwrap();
        assert_eq!(posts.base_url, "http://localhost:8383/api/v1/");
        assert_eq!(posts.timeout, Duration::from_secs(2));
        assert_eq!(posts.max_retries, 2);
        assert_eq!(posts.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(posts.health, HealthOptions::default());

        let users = directory.resolve("users").unwrap();
        assert_eq!(users.timeout, Duration::from_secs(10));
        assert_eq!(users.max_retries, 5);
        assert_eq!(users.user_agent, "users_service");
        assert_eq!(
            users.health,
            HealthOptions {
                time_window: Duration::from_secs(5),
                max_errors: 3,
                grace_period: Duration::from_secs(30),
            }
        );

        assert!(directory.resolve("no_url").is_err());
    }

    #[test]
    fn test_load_named_environment() {
        let dir = ScratchDir::new();
        dir.write("restful_services.yml", SERVICES_YAML);

        let settings = ClientSettings {
            env_name: "production".to_string(),
            ..ClientSettings::default()
        };
        let directory = ServiceDirectory::load(&dir.0, &settings).unwrap();

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve("posts").unwrap().base_url, "http://posts.internal/api/v1");
    }

    #[test]
    fn test_missing_environment_section() {
        let dir = ScratchDir::new();
        dir.write("restful_services.yml", SERVICES_YAML);

        let settings = ClientSettings {
            env_name: "staging".to_string(),
            ..ClientSettings::default()
        };
        let err = ServiceDirectory::load(&dir.0, &settings).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_falls_back_to_rest_api_file() {
        let dir = ScratchDir::new();
        dir.write("rest_api.yml", "default:\n  posts:\n    url: http://localhost:1234/\n");

        let directory = ServiceDirectory::load(&dir.0, &ClientSettings::default()).unwrap();
        assert_eq!(directory.resolve("posts").unwrap().base_url, "http://localhost:1234/");
    }

    #[test]
    fn test_missing_folder_and_file() {
        let missing = std::env::temp_dir().join(format!("restful-client-missing-{}", uuid::Uuid::new_v4()));
        assert!(ServiceDirectory::load(&missing, &ClientSettings::default())
            .unwrap_err()
            .is_configuration());

        let empty = ScratchDir::new();
        assert!(ServiceDirectory::load(&empty.0, &ClientSettings::default())
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_directory_file_reads_environment_variables() {
        std::env::set_var("RC_DIRECTORY_TEST_HOST", "users.internal:7711");
        std::env::remove_var("RC_DIRECTORY_TEST_RETRIES");

        let dir = ScratchDir::new();
        dir.write(
            "restful_services.yml",
            "default:\n  users:\n    url: http://${RC_DIRECTORY_TEST_HOST}/api/v0/\n    retries: ${RC_DIRECTORY_TEST_RETRIES:-4}\n",
        );

        let directory = ServiceDirectory::load(&dir.0, &ClientSettings::default()).unwrap();
        let users = directory.resolve("users").unwrap();
        assert_eq!(users.base_url, "http://users.internal:7711/api/v0/");
        assert_eq!(users.max_retries, 4);

        std::env::remove_var("RC_DIRECTORY_TEST_HOST");
    }

    #[test]
    fn test_directory_file_with_unset_variable() {
        std::env::remove_var("RC_DIRECTORY_TEST_MISSING");

        let dir = ScratchDir::new();
        dir.write(
            "restful_services.yml",
            "default:\n  users:\n    url: http://${RC_DIRECTORY_TEST_MISSING}/api/v0/\n",
        );

        let err = ServiceDirectory::load(&dir.0, &ClientSettings::default()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("RC_DIRECTORY_TEST_MISSING"));
    }

    #[test]
    fn test_builder_registers_bare_names_with_postfix() {
        let dir = ScratchDir::new();
        dir.write(
            "restful_services.yml",
            "default:\n  pompa_service:\n    url: http://localhost:9999/pompa/\n    max_errors: 4\n",
        );

        let settings = ClientSettings {
            legacy_postfix: "_service".to_string(),
            ..ClientSettings::default()
        };
        let client = RestfulClient::builder()
            .settings(settings)
            .config_folder(&dir.0)
            .transport(Arc::new(StubTransport::new()))
            .build()
            .unwrap();

        assert_eq!(client.service_url("pompa").unwrap(), "http://localhost:9999/pompa/");
        assert_eq!(client.directory().resolve("pompa").unwrap().health.max_errors, 4);
        assert!(client.service_url("pompa_service").is_err());
    }

    #[test]
    fn test_env_provider_settings() {
        std::env::set_var("RC_SETTINGS_TEST_TIMEOUT_SECONDS", "3");
        std::env::set_var("RC_SETTINGS_TEST_USE_CIRCUIT_BREAKER", "false");

        let provider = EnvConfigProvider::new().with_prefix("RC_SETTINGS_TEST");
        assert_eq!(provider.get_int("timeout_seconds").unwrap(), 3);
        assert!(provider.get_string("retries").is_err());

        let settings = ClientSettings::from_provider(&provider).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.retries, 2);
        assert!(!settings.use_circuit_breaker);

        std::env::remove_var("RC_SETTINGS_TEST_TIMEOUT_SECONDS");
        std::env::remove_var("RC_SETTINGS_TEST_USE_CIRCUIT_BREAKER");
    }
}
