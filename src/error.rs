use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    #[diagnostic(code(opsdash::http))]
    Http(#[from] reqwest::Error),

    #[error("Environment error: {0}")]
    #[diagnostic(code(opsdash::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(opsdash::config))]
    Config(String),

    #[error("{service} API error: {message}")]
    #[diagnostic(code(opsdash::provider))]
    Provider {
        service: &'static str,
        message: String,
    },

    #[error("{service} API error: HTTP {status}")]
    #[diagnostic(code(opsdash::provider_status))]
    ProviderStatus {
        service: &'static str,
        status: u16,
        details: String,
    },

    #[error("Google Calendar error: {0}")]
    #[diagnostic(code(opsdash::google_calendar))]
    GoogleCalendar(String),

    #[error("Google Calendar is not connected")]
    #[diagnostic(
        code(opsdash::not_connected),
        help("Visit /api/google/auth to connect a Google account")
    )]
    NotConnected,

    #[error("Component error: {0}")]
    #[diagnostic(code(opsdash::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(opsdash::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(opsdash::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(opsdash::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type DashResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

/// Helper to create provider errors that did not come from an HTTP status
pub fn provider_error(service: &'static str, message: &str) -> Error {
    Error::Provider {
        service,
        message: message.to_string(),
    }
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
