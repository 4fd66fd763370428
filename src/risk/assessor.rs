use crate::normalize::NormalizedTarget;
use crate::risk::reputation::{LookupError, ReputationLookup};
use crate::risk::rules::RuleSet;
use crate::risk::verdict::RiskVerdict;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Lexical rules plus an optional, time-bounded reputation hook
#[derive(Clone)]
pub struct RiskAssessor {
    rules: RuleSet,
    lookup: Option<Arc<dyn ReputationLookup>>,
    lookup_timeout: Duration,
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl std::fmt::Debug for RiskAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskAssessor")
            .field("rules", &self.rules)
            .field("lookup", &self.lookup.as_ref().map(|l| l.name().to_string()))
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}

impl RiskAssessor {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            lookup: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ReputationLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Rules only, no I/O
    pub fn assess_lexical(&self, target: &NormalizedTarget) -> RiskVerdict {
        self.rules.evaluate(target).build()
    }

    /// Lexical verdict, escalated by the reputation hook when one is set.
    ///
    /// The hook never lowers severity. On timeout or failure the lexical
    /// verdict is returned unchanged and the degradation is logged once.
    pub async fn assess(&self, target: &NormalizedTarget) -> RiskVerdict {
        let mut verdict = self.assess_lexical(target);
        let Some(lookup) = &self.lookup else {
            return verdict;
        };

        let outcome = match tokio::time::timeout(self.lookup_timeout, lookup.lookup(target)).await
        {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.lookup_timeout)),
        };

        match outcome {
            Ok(Some(report)) => {
                tracing::debug!(
                    source = lookup.name(),
                    level = %report.risk_level,
                    malicious = report.is_malicious,
                    "reputation report"
                );
                verdict.escalate_with(
                    lookup.name(),
                    report.risk_level,
                    report.is_malicious,
                    &report.reasons,
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    source = lookup.name(),
                    kind = err.classification(),
                    error = %err,
                    "reputation lookup degraded to lexical verdict"
                );
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::risk::reputation::ReputationReport;
    use crate::risk::verdict::{NO_ISSUES_REASON, RiskLevel, flagged_by};
    use async_trait::async_trait;

    struct Fixed(Result<Option<ReputationReport>, String>);

    #[async_trait]
    impl ReputationLookup for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn lookup(
            &self,
            _target: &NormalizedTarget,
        ) -> Result<Option<ReputationReport>, LookupError> {
            self.0.clone().map_err(LookupError::Failed)
        }
    }

    struct Stalled;

    #[async_trait]
    impl ReputationLookup for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn lookup(
            &self,
            _target: &NormalizedTarget,
        ) -> Result<Option<ReputationReport>, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    fn report(level: RiskLevel, malicious: bool, reason: &str) -> ReputationReport {
        ReputationReport {
            risk_level: level,
            is_malicious: malicious,
            reasons: vec![reason.to_string()],
        }
    }

    #[tokio::test]
    async fn test_without_hook_matches_lexical() {
        let assessor = RiskAssessor::default();
        let target = normalize("http://example.com");
        let verdict = assessor.assess(&target).await;
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert_eq!(verdict.reasons, assessor.assess_lexical(&target).reasons);
    }

    #[tokio::test]
    async fn test_hook_escalates() {
        let assessor = RiskAssessor::default().with_lookup(Arc::new(Fixed(Ok(Some(report(
            RiskLevel::Low,
            true,
            "flagged by feed",
        ))))));
        let verdict = assessor.assess(&normalize("https://example.com")).await;
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert!(verdict.is_malicious);
        assert_eq!(verdict.reasons, vec!["flagged by feed"]);
    }

    #[tokio::test]
    async fn test_hook_never_deescalates() {
        let assessor = RiskAssessor::default().with_lookup(Arc::new(Fixed(Ok(Some(report(
            RiskLevel::Low,
            false,
            "URL found in trusted list",
        ))))));
        let verdict = assessor.assess(&normalize("https://phishing.example")).await;
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.is_malicious);
    }

    #[tokio::test]
    async fn test_failure_degrades() {
        let assessor =
            RiskAssessor::default().with_lookup(Arc::new(Fixed(Err("connection refused".into()))));
        let verdict = assessor.assess(&normalize("https://example.com")).await;
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert_eq!(verdict.reasons, vec![NO_ISSUES_REASON]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_within_bound() {
        let assessor = RiskAssessor::default()
            .with_lookup(Arc::new(Stalled))
            .with_lookup_timeout(Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        let verdict = assessor.assess(&normalize("http://example.com")).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_silent_escalation_replaces_clean_reason() {
        let assessor = RiskAssessor::default().with_lookup(Arc::new(Fixed(Ok(Some(
            ReputationReport {
                risk_level: RiskLevel::High,
                is_malicious: true,
                reasons: Vec::new(),
            },
        )))));
        let verdict = assessor.assess(&normalize("https://safe-example.com")).await;
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.is_malicious);
        assert_eq!(verdict.reasons, vec![flagged_by("fixed")]);
    }
}
