//! Scanner configuration: a TOML file, then `QR_*` environment overrides.
//!
//! ```toml
//! poll_interval_ms = 200
//! lookup_timeout_ms = 3000
//! lookup_endpoint = "https://analysis.example/api/analyze-qr"
//! suspicious_tokens = ["suspicious", "malware", "unknown"]
//! malicious_tokens = ["malicious", "phishing"]
//! url_lists = ["lists/legit_urls.txt", "lists/high_risk_urls.txt"]
//! ```
use crate::risk::{
    HttpReputationClient, LookupChain, LookupError, ReputationLookup, RiskAssessor, RuleSet,
    UrlListReputation,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const ENV_POLL_INTERVAL_MS: &str = "QR_POLL_INTERVAL_MS";
pub const ENV_MAX_ATTEMPTS: &str = "QR_MAX_ATTEMPTS";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "QR_LOOKUP_TIMEOUT_MS";
pub const ENV_LOOKUP_ENDPOINT: &str = "QR_LOOKUP_ENDPOINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("failed to load url list: {0}")]
    UrlList(#[source] std::io::Error),

    #[error("failed to build reputation client: {0}")]
    Lookup(#[from] LookupError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Camera polling interval
    pub poll_interval_ms: u64,
    /// Decoded frames before a camera scan gives up; unbounded when unset
    pub max_attempts: Option<u32>,
    pub lookup_timeout_ms: u64,
    pub lookup_endpoint: Option<String>,
    pub suspicious_tokens: Vec<String>,
    pub malicious_tokens: Vec<String>,
    /// Known-URL list files. A file named like `legit*` is trusted.
    pub url_lists: Vec<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let rules = RuleSet::default();
        Self {
            poll_interval_ms: 200,
            max_attempts: None,
            lookup_timeout_ms: 3000,
            lookup_endpoint: None,
            suspicious_tokens: rules.suspicious_tokens,
            malicious_tokens: rules.malicious_tokens,
            url_lists: Vec::new(),
        }
    }
}

impl ScannerConfig {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ScannerConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        // Zero attempts means unbounded, as with QR_MAX_ATTEMPTS=0
        config.max_attempts = config.max_attempts.filter(|&n| n > 0);

        // Relative list paths are resolved against the config file
        if let Some(base) = path.parent() {
            for list in &mut config.url_lists {
                if list.is_relative() {
                    *list = base.join(&*list);
                }
            }
        }
        Ok(config)
    }

    /// Defaults, or `path` when given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QR_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &'static str, value: String| {
            value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv { key, value })
        };

        if let Some(value) = read(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse(ENV_POLL_INTERVAL_MS, value)?;
        }
        if let Some(value) = read(ENV_MAX_ATTEMPTS) {
            let attempts = parse(ENV_MAX_ATTEMPTS, value.clone())?;
            self.max_attempts = match attempts {
                0 => None,
                n => Some(u32::try_from(n).map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_MAX_ATTEMPTS,
                    value,
                })?),
            };
        }
        if let Some(value) = read(ENV_LOOKUP_TIMEOUT_MS) {
            self.lookup_timeout_ms = parse(ENV_LOOKUP_TIMEOUT_MS, value)?;
        }
        if let Some(value) = read(ENV_LOOKUP_ENDPOINT) {
            self.lookup_endpoint = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Zero("lookup_timeout_ms"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn rules(&self) -> RuleSet {
        RuleSet::new(self.suspicious_tokens.clone(), self.malicious_tokens.clone())
    }

    /// Assessor with the configured rules and whichever reputation sources
    /// are configured (URL lists first, then the remote endpoint)
    pub fn build_assessor(&self) -> Result<RiskAssessor, ConfigError> {
        let mut sources: Vec<Box<dyn ReputationLookup>> = Vec::new();
        if !self.url_lists.is_empty() {
            let lists =
                UrlListReputation::from_files(&self.url_lists).map_err(ConfigError::UrlList)?;
            tracing::info!(urls = lists.len(), "url lists loaded");
            sources.push(Box::new(lists));
        }
        if let Some(endpoint) = &self.lookup_endpoint {
            sources.push(Box::new(HttpReputationClient::new(
                endpoint.clone(),
                self.lookup_timeout(),
            )?));
        }

        let assessor =
            RiskAssessor::new(self.rules()).with_lookup_timeout(self.lookup_timeout());
        let assessor = match sources.len() {
            0 => assessor,
            1 => match sources.pop() {
                Some(source) => assessor.with_lookup(Arc::from(source)),
                None => assessor,
            },
            _ => assessor.with_lookup(Arc::new(LookupChain::new(sources))),
        };
        Ok(assessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.lookup_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_attempts, None);
        assert_eq!(config.rules(), RuleSet::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "poll_interval_ms = 100\nmalicious_tokens = [\"scam\"]\nurl_lists = [\"legit_urls.txt\"]"
        )
        .unwrap();

        let config = ScannerConfig::from_file(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.malicious_tokens, vec!["scam"]);
        assert_eq!(config.suspicious_tokens, RuleSet::default().suspicious_tokens);
        assert_eq!(config.url_lists, vec![dir.path().join("legit_urls.txt")]);
    }

    #[test]
    fn test_zero_attempts_in_file_is_unbounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        std::fs::write(&path, "max_attempts = 0").unwrap();

        let config = ScannerConfig::from_file(&path).unwrap();
        assert_eq!(config.max_attempts, None);
        assert!(config.validate().is_ok());

        let mut config = ScannerConfig::default();
        config
            .apply_env(|key: &str| (key == ENV_MAX_ATTEMPTS).then(|| "0".to_string()))
            .unwrap();
        assert_eq!(config.max_attempts, None);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        std::fs::write(&path, "poll_interval_ms = \"fast\"").unwrap();
        assert!(matches!(
            ScannerConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ScannerConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ScannerConfig::default();
        config
            .apply_env(env(&[
                (ENV_POLL_INTERVAL_MS, "50"),
                (ENV_MAX_ATTEMPTS, "12"),
                (ENV_LOOKUP_ENDPOINT, " http://localhost:8080/analyze "),
                (ENV_LOOKUP_TIMEOUT_MS, ""),
            ]))
            .unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_attempts, Some(12));
        assert_eq!(config.lookup_timeout_ms, 3000);
        assert_eq!(
            config.lookup_endpoint.as_deref(),
            Some("http://localhost:8080/analyze")
        );

        let err = config
            .apply_env(env(&[(ENV_POLL_INTERVAL_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: ENV_POLL_INTERVAL_MS, .. }));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = ScannerConfig {
            poll_interval_ms: 0,
            ..ScannerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("poll_interval_ms"))));
    }

    #[test]
    fn test_build_assessor_with_lists() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("confirmed_malicious_urls.txt");
        std::fs::write(&list, "https://evil.example\n").unwrap();
        let config = ScannerConfig {
            url_lists: vec![list],
            ..ScannerConfig::default()
        };
        assert!(config.build_assessor().is_ok());

        let missing = ScannerConfig {
            url_lists: vec![dir.path().join("nope.txt")],
            ..ScannerConfig::default()
        };
        assert!(matches!(missing.build_assessor(), Err(ConfigError::UrlList(_))));
    }
}
