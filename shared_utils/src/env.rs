//! Environment variable access with structured errors.
//!
//! Binaries read overrides (database URL, tuning knobs) through these helpers so
//! that a missing or unparsable variable surfaces as a typed error instead of a
//! bare `VarError`.

use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading environment variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but its value could not be parsed.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Raw value as found in the environment.
        value: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    std::env::var(name).map_err(|_| EnvError::Missing(name.to_string()))
}

/// Reads an optional override. Unset and empty variables both yield `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses an optional override, e.g. a numeric batch size.
///
/// Returns `Ok(None)` when the variable is unset or empty.
pub fn parse_env_var_opt<T: FromStr>(name: &str) -> Result<Option<T>, EnvError> {
    match get_env_var_opt(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EnvError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
    }
}
