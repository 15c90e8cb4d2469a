//! Error handling for the restful client
//!
//! Every failure a call can end in is a `ServiceError` variant. Errors that
//! leave the engine are wrapped in `WithContext` so the caller can see which
//! service, endpoint and request they belong to.

use thiserror::Error;

/// Result type for restful client operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the restful client
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Unknown service name, unreadable directory file or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The health tracker reports the service as down
    #[error("{service} set as down.")]
    ServiceDown { service: String },

    /// The request timed out and no retry budget was left
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// No HTTP response was received at all
    #[error("Http error: {0}")]
    Http(String),

    /// The service answered with a server error or an unclassifiable code
    #[error("Bad return code {status}: {message}")]
    BadReturnCode { status: u16, message: String },

    /// A successful response carried a body that is not the expected JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// The transport failed before producing an outcome
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

impl ServiceError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Create a service down error
    pub fn service_down(service: impl Into<String>) -> Self {
        ServiceError::ServiceDown {
            service: service.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create an http error
    pub fn http(message: impl Into<String>) -> Self {
        ServiceError::Http(message.into())
    }

    /// Create a bad return code error
    pub fn bad_return_code(status: u16, message: impl Into<String>) -> Self {
        ServiceError::BadReturnCode {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        ServiceError::Decode(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::Transport(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// The innermost error, with all context layers stripped
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Get the service name if available
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ServiceError::ServiceDown { service } => Some(service),
            ServiceError::WithContext { context, .. } => Some(&context.service),
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::BadReturnCode { status, .. } => Some(*status),
            ServiceError::WithContext { inner, context } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Get the request id if available
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, inner } => {
                context.request_id.as_deref().or_else(|| inner.request_id())
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ServiceError::Timeout(_))
    }

    pub fn is_service_down(&self) -> bool {
        matches!(self.root(), ServiceError::ServiceDown { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), ServiceError::Configuration(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self.root(), ServiceError::Decode(_))
    }

    /// Short name of the failure kind, used in log lines and reports
    pub fn kind(&self) -> &'static str {
        match self.root() {
            ServiceError::Configuration(_) => "ConfigurationError",
            ServiceError::ServiceDown { .. } => "ServiceDown",
            ServiceError::Timeout(_) => "TimeoutOccured",
            ServiceError::Http(_) => "HttpError",
            ServiceError::BadReturnCode { .. } => "BadReturnCode",
            ServiceError::Decode(_) => "DecodeFailure",
            ServiceError::Transport(_) => "TransportError",
            ServiceError::WithContext { .. } => unreachable!("root() strips context"),
        }
    }

    /// Message handed to a recovery callback for this failure
    pub fn recovery_message(&self) -> String {
        match (self.root(), self.service_name()) {
            (ServiceError::ServiceDown { service }, _) => format!("{} set as down.", service),
            (root, Some(service)) => format!("Exception in {} execution - {}", service, root),
            (root, None) => format!("Exception in execution - {}", root),
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service the failed call was addressed to
    pub service: String,

    /// Time the error was raised
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            request_id: None,
            endpoint: None,
        }
    }
}

impl ErrorContext {
    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Convert reqwest errors that escape the transport's own classification
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let service_error = if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::http(format!("Connection error: {}", err))
        } else if err.is_builder() || err.is_request() {
            ServiceError::transport(format!("Invalid request: {}", err))
        } else if err.is_decode() {
            ServiceError::decode(format!("Response decode error: {}", err))
        } else {
            ServiceError::transport(format!("HTTP client error: {}", err))
        };

        match err.status() {
            Some(status) => service_error
                .with_context(ErrorContext::for_service("http_client").status_code(status.as_u16())),
            None => service_error,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::decode(format!("JSON error: {}", err))
    }
}

impl From<config::ConfigError> for ServiceError {
    fn from(err: config::ConfigError) -> Self {
        ServiceError::configuration(err.to_string())
    }
}
