//! Handover retry rules: fail-cause matched, capability-agnostic.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::types::Capability;

use super::parse::parse_rule_string;
use super::{FailCause, RuleError, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MS};

/// Rule governing retries of failed handover attempts between transports.
///
/// Unlike setup rules there is no match-condition requirement: a rule with no
/// fail causes matches every failure. A `capabilities` key is accepted for
/// symmetry with setup rules but never participates in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverRetryRule {
    capabilities: BTreeSet<Capability>,
    fail_causes: BTreeSet<FailCause>,
    retry_intervals_millis: Vec<u64>,
    max_retries: u32,
}

impl FromStr for HandoverRetryRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, RuleError> {
        let raw = parse_rule_string(s, false)?;
        Ok(Self {
            capabilities: raw.capabilities,
            fail_causes: raw.fail_causes,
            retry_intervals_millis: raw
                .retry_intervals_millis
                .unwrap_or_else(|| vec![DEFAULT_RETRY_INTERVAL_MS]),
            max_retries: raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

impl HandoverRetryRule {
    pub fn fail_causes(&self) -> &BTreeSet<FailCause> {
        &self.fail_causes
    }

    pub fn retry_intervals_millis(&self) -> &[u64] {
        &self.retry_intervals_millis
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// An empty fail-cause set matches every failure.
    pub fn can_be_matched(&self, fail_cause: FailCause) -> bool {
        self.fail_causes.is_empty() || self.fail_causes.contains(&fail_cause)
    }

    /// Backoff delay for the given number of already-failed attempts; the last
    /// interval repeats once the schedule is exhausted.
    pub fn interval_for_attempt(&self, failed_count: usize) -> u64 {
        let idx = failed_count.min(self.retry_intervals_millis.len() - 1);
        self.retry_intervals_millis[idx]
    }
}

impl fmt::Display for HandoverRetryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if !self.capabilities.is_empty() {
            let caps: Vec<&str> = self.capabilities.iter().map(|c| c.as_token()).collect();
            parts.push(format!("capabilities={}", caps.join("|")));
        }
        if !self.fail_causes.is_empty() {
            let causes: Vec<String> = self.fail_causes.iter().map(|c| c.to_string()).collect();
            parts.push(format!("fail_causes={}", causes.join("|")));
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
