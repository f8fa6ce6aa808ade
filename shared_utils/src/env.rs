use std::str::FromStr;

use thiserror::Error;

use crate::config::ConfigError;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing: a blank `POLYGON_API_KEY=` in a shell
/// profile should fail the same way an unset one does.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an optional environment variable; `None` when unset or blank.
pub fn env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads an environment variable or falls back to `default`.
pub fn env_var_or(name: &str, default: &str) -> String {
    env_var_opt(name).unwrap_or_else(|| default.to_string())
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset, and a [`ConfigError::Invalid`]
/// when it is set but does not parse as `T`.
pub fn parse_env_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var_opt(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
    }
}
