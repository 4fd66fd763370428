use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason used when no rule fires
pub const NO_ISSUES_REASON: &str = "No security issues detected";

/// Severity, totally ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Outcome of assessing one target.
///
/// `reasons` is never empty and `is_malicious` implies at least `Medium`;
/// both hold for every value built through [`VerdictBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskVerdict {
    pub risk_level: RiskLevel,
    pub is_malicious: bool,
    pub reasons: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

/// Accumulates triggered rules. Severity only ever rises.
#[derive(Debug, Clone, Default)]
pub struct VerdictBuilder {
    level: Option<RiskLevel>,
    is_malicious: bool,
    reasons: Vec<String>,
}

impl VerdictBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a triggered rule at `level`
    pub fn flag(&mut self, level: RiskLevel, reason: impl Into<String>) -> &mut Self {
        self.level = Some(self.level.map_or(level, |current| current.max(level)));
        let reason = reason.into();
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
        self
    }

    /// Mark the target malicious; raises severity to at least `Medium`
    pub fn malicious(&mut self) -> &mut Self {
        self.is_malicious = true;
        self.level = Some(self.level.map_or(RiskLevel::Medium, |l| l.max(RiskLevel::Medium)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn build(&self) -> RiskVerdict {
        let mut reasons = self.reasons.clone();
        let risk_level = match self.level {
            Some(level) if !reasons.is_empty() => level,
            _ => {
                reasons = vec![NO_ISSUES_REASON.to_string()];
                if self.is_malicious {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                }
            }
        };
        RiskVerdict {
            risk_level,
            is_malicious: self.is_malicious,
            reasons,
            evaluated_at: Utc::now(),
        }
    }
}

impl RiskVerdict {
    /// Merge a further finding from `source` without ever lowering severity.
    /// The placeholder reason is dropped once a real one is present; a
    /// finding that raises the verdict without a reason of its own is
    /// recorded under the source's name.
    pub fn escalate_with(
        &mut self,
        source: &str,
        level: RiskLevel,
        is_malicious: bool,
        reasons: &[String],
    ) {
        let raised = level > self.risk_level
            || (is_malicious && (!self.is_malicious || self.risk_level < RiskLevel::Medium));

        let mut added = false;
        for reason in reasons {
            if reason != NO_ISSUES_REASON && !self.reasons.contains(reason) {
                self.reasons.push(reason.clone());
                added = true;
            }
        }
        if raised && !added {
            let flagged = flagged_by(source);
            if !self.reasons.contains(&flagged) {
                self.reasons.push(flagged);
            }
        }
        if self.reasons.len() > 1 {
            self.reasons.retain(|r| r != NO_ISSUES_REASON);
        }

        self.risk_level = self.risk_level.max(level);
        if is_malicious {
            self.is_malicious = true;
            self.risk_level = self.risk_level.max(RiskLevel::Medium);
        }
    }
}

/// Reason recorded when `source` raises a verdict without explaining why
pub fn flagged_by(source: &str) -> String {
    format!("Flagged by reputation lookup '{source}'")
}
