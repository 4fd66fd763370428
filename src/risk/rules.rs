//! Deterministic lexical rules. No I/O.
use crate::normalize::NormalizedTarget;
use crate::risk::verdict::{RiskLevel, VerdictBuilder};
use serde::{Deserialize, Serialize};

pub const INSECURE_SCHEME_REASON: &str = "Non-secure connection (HTTP instead of HTTPS)";
pub const PHISHING_REASON: &str = "Potential phishing attempt";
pub const SCRIPT_INJECTION_REASON: &str = "Possible script injection payload";
pub const SQL_INJECTION_REASON: &str = "Possible SQL injection payload";

const SCRIPT_MARKERS: [&str; 4] = ["<script", "javascript:", "onerror=", "alert("];
const SQL_MARKERS: [&str; 3] = ["select * from", "drop table", "union select"];

/// Token lists matched against the hostname and path of a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub suspicious_tokens: Vec<String>,
    pub malicious_tokens: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            suspicious_tokens: vec!["suspicious".into(), "malware".into(), "unknown".into()],
            malicious_tokens: vec!["malicious".into(), "phishing".into()],
        }
    }
}

impl RuleSet {
    pub fn new(suspicious_tokens: Vec<String>, malicious_tokens: Vec<String>) -> Self {
        let clean = |tokens: Vec<String>| {
            tokens
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            suspicious_tokens: clean(suspicious_tokens),
            malicious_tokens: clean(malicious_tokens),
        }
    }

    /// Run every rule in precedence order. Reasons accumulate in that order.
    pub fn evaluate(&self, target: &NormalizedTarget) -> VerdictBuilder {
        let mut builder = VerdictBuilder::new();
        let parsed = target.parsed_url();

        if parsed.as_ref().is_some_and(|u| u.scheme() == "http") {
            builder.flag(RiskLevel::Medium, INSECURE_SCHEME_REASON);
        }

        let haystack = parsed
            .as_ref()
            .map(|u| {
                let host = u.host_str().unwrap_or_default();
                format!("{} {}", host, u.path()).to_lowercase()
            })
            .unwrap_or_else(|| target.url.to_lowercase());

        for token in &self.suspicious_tokens {
            if haystack.contains(token.as_str()) {
                builder.flag(
                    RiskLevel::Medium,
                    format!("Suspicious domain detected (matched '{token}')"),
                );
            }
        }

        for token in &self.malicious_tokens {
            if haystack.contains(token.as_str()) {
                builder
                    .flag(
                        RiskLevel::High,
                        format!("Known malicious domain (matched '{token}')"),
                    )
                    .flag(RiskLevel::High, PHISHING_REASON)
                    .malicious();
            }
        }

        let payload = collapse_whitespace(&target.raw_text.to_lowercase());
        if SCRIPT_MARKERS.iter().any(|m| payload.contains(m)) {
            builder.flag(RiskLevel::High, SCRIPT_INJECTION_REASON).malicious();
        }
        if SQL_MARKERS.iter().any(|m| payload.contains(m)) {
            builder.flag(RiskLevel::High, SQL_INJECTION_REASON).malicious();
        }

        builder
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::risk::verdict::NO_ISSUES_REASON;

    #[test]
    fn test_clean_https_link() {
        let verdict = RuleSet::default().evaluate(&normalize("https://example.com")).build();
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert_eq!(verdict.reasons, vec![NO_ISSUES_REASON]);
        assert!(!verdict.is_malicious);
    }

    #[test]
    fn test_http_is_medium() {
        let verdict = RuleSet::default().evaluate(&normalize("http://example.com")).build();
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert_eq!(verdict.reasons, vec![INSECURE_SCHEME_REASON]);
    }

    #[test]
    fn test_reasons_follow_rule_order() {
        let target = normalize("http://suspicious-phishing.example/login");
        let verdict = RuleSet::default().evaluate(&target).build();
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.is_malicious);
        assert_eq!(
            verdict.reasons,
            vec![
                INSECURE_SCHEME_REASON.to_string(),
                "Suspicious domain detected (matched 'suspicious')".to_string(),
                "Known malicious domain (matched 'phishing')".to_string(),
                PHISHING_REASON.to_string(),
            ]
        );
    }

    #[test]
    fn test_token_in_path() {
        let verdict = RuleSet::default()
            .evaluate(&normalize("https://example.com/malware/payload.exe"))
            .build();
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert!(!verdict.is_malicious);
    }

    #[test]
    fn test_injection_markers() {
        let script = RuleSet::default()
            .evaluate(&normalize("<script>alert(1)</script>"))
            .build();
        assert!(script.is_malicious);
        assert!(script.reasons.contains(&SCRIPT_INJECTION_REASON.to_string()));

        let sql = RuleSet::default()
            .evaluate(&normalize("1; DROP   TABLE users"))
            .build();
        assert_eq!(sql.risk_level, RiskLevel::High);
        assert!(sql.reasons.contains(&SQL_INJECTION_REASON.to_string()));
    }

    #[test]
    fn test_custom_tokens_are_normalized() {
        let rules = RuleSet::new(vec!["  Casino ".into(), String::new()], vec![]);
        assert_eq!(rules.suspicious_tokens, vec!["casino"]);
        let verdict = rules.evaluate(&normalize("https://best-casino.example")).build();
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }
}
