use thiserror::Error;

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A setting is present but its value cannot be used.
    #[error("Invalid value {value:?} for {name}: {message}")]
    Invalid {
        name: String,
        value: String,
        message: String,
    },
}

impl From<crate::env::MissingEnvVarError> for ConfigError {
    fn from(err: crate::env::MissingEnvVarError) -> Self {
        ConfigError::MissingEnvVar(err.0)
    }
}
