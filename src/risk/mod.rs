//! Risk assessment of a normalized target.
//!
//! [`RuleSet`] applies deterministic lexical rules in a fixed order and
//! [`RiskAssessor`] optionally consults a [`ReputationLookup`] afterwards.
//! The lookup can only raise severity.

pub mod assessor;
pub mod reputation;
pub mod rules;
pub mod verdict;

pub use assessor::{DEFAULT_LOOKUP_TIMEOUT, RiskAssessor};
pub use reputation::{
    HttpReputationClient, LookupChain, LookupError, ReputationLookup, ReputationReport,
    UrlListReputation,
};
pub use rules::RuleSet;
pub use verdict::{NO_ISSUES_REASON, RiskLevel, RiskVerdict, VerdictBuilder, flagged_by};
