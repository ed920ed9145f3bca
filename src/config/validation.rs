//! Configuration errors and parsing helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),

    /// The fping binary could not be located.
    #[error("fping binary '{binary}' not found: {source}")]
    MissingBinary {
        binary: String,
        #[source]
        source: which::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// Parse a sink timeout such as `5s` or `1500ms` with humantime.
///
/// A zero timeout would fail every HTTP write, so it is rejected.
///
/// # Examples
///
/// ```
/// use joki::config::parse_duration;
///
/// assert_eq!(parse_duration("5s").unwrap().as_secs(), 5);
/// assert_eq!(parse_duration("1500ms").unwrap().as_millis(), 1500);
/// assert!(parse_duration("0s").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match humantime::parse_duration(s.trim()) {
        Ok(d) if d.is_zero() => Err(format!("'{s}' is not a positive duration")),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("'{s}': {e}")),
    }
}

/// `${VAR}` or `${VAR:-fallback}` inside a credential.
static CREDENTIAL_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid credential pattern")
});

/// Substitute environment variables into InfluxDB credentials.
///
/// Unset variables resolve to their fallback, or to an empty string.
pub fn expand_env_vars(input: &str) -> String {
    CREDENTIAL_VAR
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Locate the fping binary on `PATH` (or check an explicit path).
pub fn locate_binary(binary: &str) -> Result<std::path::PathBuf, ConfigError> {
    which::which(binary).map_err(|source| ConfigError::MissingBinary {
        binary: binary.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(" 1m ").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("0ms").is_err());
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("${JOKI_NONEXISTENT_PASS_98765:-fallback}");
        assert_eq!(result, "fallback");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: only this test touches this variable.
        unsafe {
            std::env::set_var("JOKI_TEST_INFLUX_USER", "grafana");
        }
        assert_eq!(expand_env_vars("${JOKI_TEST_INFLUX_USER}"), "grafana");
        // SAFETY: cleanup of the test-specific variable.
        unsafe {
            std::env::remove_var("JOKI_TEST_INFLUX_USER");
        }
    }

    #[test]
    fn test_locate_binary_missing() {
        let err = locate_binary("joki-definitely-not-a-binary-1234").unwrap_err();
        assert!(matches!(err, ConfigError::MissingBinary { .. }));
        assert!(err.to_string().contains("joki-definitely-not-a-binary-1234"));
    }
}
