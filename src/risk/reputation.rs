//! Optional reputation hook consulted after the lexical rules.
//!
//! Two implementations ship with the crate: a JSON-over-HTTP client for a
//! remote analysis endpoint, and a local known-URL list lookup.
use crate::normalize::NormalizedTarget;
use crate::risk::verdict::RiskLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const TRUSTED_LIST_REASON: &str = "URL found in trusted list";

/// Findings of one reputation source, already mapped into local types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationReport {
    pub risk_level: RiskLevel,
    pub is_malicious: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("reputation lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("reputation lookup failed: {0}")]
    Failed(String),
}

impl LookupError {
    pub fn classification(&self) -> &'static str {
        match self {
            LookupError::Timeout(_) => "lookup_timeout",
            LookupError::Failed(_) => "lookup_failed",
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Failed(err.to_string())
    }
}

/// A source of reputation data for a target.
///
/// `Ok(None)` means the source has no opinion.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, target: &NormalizedTarget)
    -> Result<Option<ReputationReport>, LookupError>;
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    url: &'a str,
}

/// Wire shape of the remote endpoint's answer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteReport {
    risk_level: Option<String>,
    #[serde(default)]
    is_malicious: bool,
    #[serde(default)]
    reasons: Vec<String>,
}

impl RemoteReport {
    fn into_report(self) -> Result<ReputationReport, LookupError> {
        let risk_level = match self.risk_level.as_deref().map(str::to_ascii_lowercase) {
            Some(level) if level == "low" => RiskLevel::Low,
            Some(level) if level == "medium" => RiskLevel::Medium,
            Some(level) if level == "high" => RiskLevel::High,
            Some(other) => {
                return Err(LookupError::Failed(format!("unknown risk level '{other}'")));
            }
            None if self.is_malicious => RiskLevel::Medium,
            None => RiskLevel::Low,
        };
        let risk_level = if self.is_malicious {
            risk_level.max(RiskLevel::Medium)
        } else {
            risk_level
        };
        Ok(ReputationReport {
            risk_level,
            is_malicious: self.is_malicious,
            reasons: self
                .reasons
                .into_iter()
                .filter(|r| !r.trim().is_empty())
                .collect(),
        })
    }
}

/// `POST {endpoint}` with `{"url": ...}`
pub struct HttpReputationClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReputationClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("qr_sentinel/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReputationLookup for HttpReputationClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(
        &self,
        target: &NormalizedTarget,
    ) -> Result<Option<ReputationReport>, LookupError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LookupRequest { url: &target.url })
            .send()
            .await?
            .error_for_status()?;
        let remote: RemoteReport = response.json().await?;
        remote.into_report().map(Some)
    }
}

#[derive(Debug, Clone)]
struct UrlList {
    name: String,
    trusted: bool,
    urls: HashSet<String>,
}

/// Local known-URL lists. A URL in a trusted list reports `Low`; a URL in any
/// other list reports `High` and malicious. Unlisted URLs get no opinion.
#[derive(Debug, Clone, Default)]
pub struct UrlListReputation {
    lists: Vec<UrlList>,
}

impl UrlListReputation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list<I, S>(mut self, name: impl Into<String>, trusted: bool, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|u| canonical(u.as_ref()))
            .filter(|u| !u.is_empty())
            .collect();
        self.lists.push(UrlList {
            name: name.into(),
            trusted,
            urls,
        });
        self
    }

    /// Load newline-separated list files. A file whose stem contains
    /// `legit` is a trusted list. Blank lines and `#` comments are skipped.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Self> {
        let mut lookup = Self::new();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path)?;
            let name = list_name(path);
            let trusted = name.to_lowercase().contains("legit");
            let urls = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'));
            lookup = lookup.with_list(name, trusted, urls);
            tracing::debug!(path = %path.display(), trusted, "loaded url list");
        }
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(|l| l.urls.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Synchronous form of [`ReputationLookup::lookup`]
    pub fn check(&self, target: &NormalizedTarget) -> Option<ReputationReport> {
        let keys = [canonical(&target.url), canonical(&target.raw_text)];
        let hit = |list: &UrlList| keys.iter().any(|k| list.urls.contains(k));

        if let Some(list) = self.lists.iter().find(|l| !l.trusted && hit(l)) {
            return Some(ReputationReport {
                risk_level: RiskLevel::High,
                is_malicious: true,
                reasons: vec![format!("URL found in known-malicious list '{}'", list.name)],
            });
        }
        if self.lists.iter().any(|l| l.trusted && hit(l)) {
            return Some(ReputationReport {
                risk_level: RiskLevel::Low,
                is_malicious: false,
                reasons: vec![TRUSTED_LIST_REASON.to_string()],
            });
        }
        None
    }
}

#[async_trait]
impl ReputationLookup for UrlListReputation {
    fn name(&self) -> &str {
        "url_list"
    }

    async fn lookup(
        &self,
        target: &NormalizedTarget,
    ) -> Result<Option<ReputationReport>, LookupError> {
        Ok(self.check(target))
    }
}

/// Consults several sources in order and merges their reports. Severity is
/// the maximum reported; a failing source is skipped unless all of them fail.
pub struct LookupChain {
    sources: Vec<Box<dyn ReputationLookup>>,
}

impl LookupChain {
    pub fn new(sources: Vec<Box<dyn ReputationLookup>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl ReputationLookup for LookupChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn lookup(
        &self,
        target: &NormalizedTarget,
    ) -> Result<Option<ReputationReport>, LookupError> {
        let mut merged: Option<ReputationReport> = None;
        let mut first_error = None;
        let mut answered = 0usize;

        for source in &self.sources {
            match source.lookup(target).await {
                Ok(Some(report)) => {
                    answered += 1;
                    match merged.as_mut() {
                        Some(acc) => {
                            acc.risk_level = acc.risk_level.max(report.risk_level);
                            acc.is_malicious |= report.is_malicious;
                            for reason in report.reasons {
                                if !acc.reasons.contains(&reason) {
                                    acc.reasons.push(reason);
                                }
                            }
                        }
                        None => merged = Some(report),
                    }
                }
                Ok(None) => answered += 1,
                Err(err) => {
                    tracing::debug!(source = source.name(), error = %err, "chained lookup failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if answered == 0 => Err(err),
            _ => Ok(merged),
        }
    }
}

fn list_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lowercased, trimmed, without a trailing slash
fn canonical(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}
