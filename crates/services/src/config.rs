//! Environment-driven configuration.
//!
//! Every loader has a `from_lookup` twin taking a key lookup function so tests
//! never have to touch the process environment.

use std::env;
use std::time::Duration;

use learn_core::model::{Score, ScoreThresholds};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a base url and make sure it ends with `/` so relative joins append
/// instead of replacing the last path segment.
///
/// # Errors
///
/// Returns `url::ParseError` if `raw` is not an absolute url.
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

fn url_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Url>, ConfigError> {
    lookup(var)
        .map(|raw| parse_base_url(&raw).map_err(|source| ConfigError::InvalidUrl { var, source }))
        .transpose()
}

fn number_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

/// Where the course API lives and how long a request may take.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Read `LEARN_API_BASE_URL` and `LEARN_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Build a config for a known base url, e.g. a test server.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `base_url` is not absolute.
    pub fn for_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = match url_var(&lookup, "LEARN_API_BASE_URL")? {
            Some(url) => url,
            None => parse_base_url(DEFAULT_API_BASE_URL).map_err(|source| {
                ConfigError::InvalidUrl {
                    var: "LEARN_API_BASE_URL",
                    source,
                }
            })?,
        };
        let timeout = Duration::from_secs(
            number_var(&lookup, "LEARN_API_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        Ok(Self { base_url, timeout })
    }
}

/// Optional dedicated grading endpoint. When unset, assignments are graded
/// through the course API.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraderConfig {
    pub url: Option<Url>,
}

impl GraderConfig {
    /// Read `LEARN_GRADER_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the url is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when the url is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: url_var(&lookup, "LEARN_GRADER_URL")?,
        })
    }
}

/// Read `LEARN_PASS_SCORE`, `LEARN_STRONG_SCORE` and `LEARN_BORDERLINE_SCORE`,
/// falling back to 70 / 75 / 50.
///
/// # Errors
///
/// Returns `ConfigError` if a value is not a number, exceeds 100, or the
/// thresholds are out of order.
pub fn thresholds_from_env() -> Result<ScoreThresholds, ConfigError> {
    thresholds_from_lookup(env_lookup)
}

/// # Errors
///
/// See [`thresholds_from_env`].
pub fn thresholds_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ScoreThresholds, ConfigError> {
    let defaults = ScoreThresholds::default();
    let score = |var: &'static str, fallback: Score| -> Result<Score, ConfigError> {
        match number_var(&lookup, var)? {
            Some(raw) => {
                let raw = u32::try_from(raw).map_err(|_| ConfigError::InvalidNumber {
                    var,
                    value: raw.to_string(),
                })?;
                Ok(Score::new(raw)?)
            }
            None => Ok(fallback),
        }
    };
    let pass = score("LEARN_PASS_SCORE", defaults.pass())?;
    let strong = score("LEARN_STRONG_SCORE", defaults.strong())?;
    let borderline = score("LEARN_BORDERLINE_SCORE", defaults.borderline())?;
    Ok(ScoreThresholds::new(pass, strong, borderline)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn api_config_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8000/api/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.base_url.join("courses/1").unwrap().as_str(),
            "http://127.0.0.1:8000/api/courses/1"
        );
    }

    #[test]
    fn api_config_reads_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("LEARN_API_BASE_URL", "https://learn.example.com/v2/"),
            ("LEARN_API_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://learn.example.com/v2/");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[("LEARN_API_BASE_URL", "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[("LEARN_API_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(GraderConfig::from_lookup(lookup(&[("LEARN_GRADER_URL", "::")])).is_err());
    }

    #[test]
    fn thresholds_default_and_validate() {
        let t = thresholds_from_lookup(lookup(&[])).unwrap();
        assert_eq!(t, ScoreThresholds::default());

        let t = thresholds_from_lookup(lookup(&[("LEARN_PASS_SCORE", "60")])).unwrap();
        assert_eq!(t.pass().value(), 60);

        assert!(thresholds_from_lookup(lookup(&[("LEARN_PASS_SCORE", "101")])).is_err());
        assert!(thresholds_from_lookup(lookup(&[("LEARN_PASS_SCORE", "90")])).is_err());
    }
}
