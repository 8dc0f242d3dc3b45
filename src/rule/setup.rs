//! Setup retry rules: match conditions, backoff schedule, permanent failures.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::types::Capability;

use super::parse::parse_rule_string;
use super::{FailCause, RuleError, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MS};

/// Rule governing retries of failed data network setup attempts.
///
/// Exactly one match condition family must be present: capabilities and/or
/// fail causes, or permanent fail causes alone. A matching permanent fail
/// cause marks the profile permanently failed instead of backing off on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRetryRule {
    capabilities: BTreeSet<Capability>,
    fail_causes: BTreeSet<FailCause>,
    permanent: bool,
    retry_intervals_millis: Vec<u64>,
    max_retries: u32,
}

impl FromStr for SetupRetryRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, RuleError> {
        let raw = parse_rule_string(s, true)?;
        let permanent = !raw.permanent_fail_causes.is_empty();
        if permanent && (!raw.capabilities.is_empty() || !raw.fail_causes.is_empty()) {
            return Err(RuleError::ConflictingMatchCondition);
        }
        if !permanent && raw.capabilities.is_empty() && raw.fail_causes.is_empty() {
            return Err(RuleError::MissingMatchCondition);
        }
        let fail_causes = if permanent {
            raw.permanent_fail_causes
        } else {
            raw.fail_causes
        };
        Ok(Self {
            capabilities: raw.capabilities,
            fail_causes,
            permanent,
            retry_intervals_millis: raw
                .retry_intervals_millis
                .unwrap_or_else(|| vec![DEFAULT_RETRY_INTERVAL_MS]),
            max_retries: raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

impl SetupRetryRule {
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Fail causes this rule matches; permanent causes when
    /// [`SetupRetryRule::is_permanent_fail_cause_rule`] is set.
    pub fn fail_causes(&self) -> &BTreeSet<FailCause> {
        &self.fail_causes
    }

    pub fn is_permanent_fail_cause_rule(&self) -> bool {
        self.permanent
    }

    pub fn retry_intervals_millis(&self) -> &[u64] {
        &self.retry_intervals_millis
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// First-match-wins predicate: a rule with only capabilities matches any
    /// fail cause for those capabilities, a rule with only fail causes matches
    /// any capability for those causes, a rule with both requires both.
    pub fn can_be_matched(&self, capability: Capability, fail_cause: FailCause) -> bool {
        if !self.fail_causes.is_empty() && !self.fail_causes.contains(&fail_cause) {
            return false;
        }
        self.capabilities.is_empty() || self.capabilities.contains(&capability)
    }

    /// Backoff delay for the given number of already-failed attempts; the last
    /// interval repeats once the schedule is exhausted.
    pub fn interval_for_attempt(&self, failed_count: usize) -> u64 {
        let idx = failed_count.min(self.retry_intervals_millis.len() - 1);
        self.retry_intervals_millis[idx]
    }
}

impl fmt::Display for SetupRetryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if !self.capabilities.is_empty() {
            let caps: Vec<&str> = self.capabilities.iter().map(|c| c.as_token()).collect();
            parts.push(format!("capabilities={}", caps.join("|")));
        }
        if !self.fail_causes.is_empty() {
            let key = if self.permanent {
                "permanent_fail_causes"
            } else {
                "fail_causes"
            };
            let causes: Vec<String> = self.fail_causes.iter().map(|c| c.to_string()).collect();
            parts.push(format!("{}={}", key, causes.join("|")));
        }
        let intervals: Vec<String> = self
            .retry_intervals_millis
            .iter()
            .map(|i| i.to_string())
            .collect();
        parts.push(format!("retry_interval={}", intervals.join("|")));
        parts.push(format!("maximum_retries={}", self.max_retries));
        f.write_str(&parts.join(", "))
    }
}
