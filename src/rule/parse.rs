//! Tokenizer shared by both rule kinds.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::types::Capability;

use super::FailCause;

/// Reason a rule string was rejected. The engine never installs a rule set
/// containing a rejected rule.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{0}` is not a comma-separated list of key=value tokens")]
    Malformed(String),
    #[error("unrecognized key `{0}` in retry rule")]
    UnknownKey(String),
    #[error("unrecognized capability `{0}` in retry rule")]
    UnknownCapability(String),
    #[error("invalid number `{value}` for `{key}` in retry rule")]
    InvalidNumber { key: &'static str, value: String },
    #[error("negative value {value} for `{key}` in retry rule")]
    NegativeValue { key: &'static str, value: i64 },
    #[error("setup retry rule needs capabilities, fail_causes or permanent_fail_causes")]
    MissingMatchCondition,
    #[error("permanent_fail_causes cannot be combined with capabilities or fail_causes")]
    ConflictingMatchCondition,
}

/// Key/value pairs of a rule string, before kind-specific validation.
#[derive(Debug, Default)]
pub(super) struct RawRule {
    pub(super) capabilities: BTreeSet<Capability>,
    pub(super) fail_causes: BTreeSet<FailCause>,
    pub(super) permanent_fail_causes: BTreeSet<FailCause>,
    pub(super) retry_intervals_millis: Option<Vec<u64>>,
    pub(super) max_retries: Option<u32>,
}

/// Tokenize `rule` into key/value pairs. Whitespace around keys, values, and
/// pipe-separated list items is stripped.
pub(super) fn parse_rule_string(rule: &str, allow_permanent: bool) -> Result<RawRule, RuleError> {
    let mut raw = RawRule::default();
    let mut seen_any = false;
    for token in rule.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once('=') else {
            return Err(RuleError::Malformed(rule.trim().to_string()));
        };
        seen_any = true;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "capabilities" => raw.capabilities = parse_capability_list(value)?,
            "fail_causes" => raw.fail_causes = parse_cause_list("fail_causes", value)?,
            "permanent_fail_causes" if allow_permanent => {
                raw.permanent_fail_causes = parse_cause_list("permanent_fail_causes", value)?;
            }
            "retry_interval" => raw.retry_intervals_millis = Some(parse_interval_list(value)?),
            "maximum_retries" => raw.max_retries = Some(parse_max_retries(value)?),
            _ => return Err(RuleError::UnknownKey(key.trim().to_string())),
        }
    }
    if !seen_any {
        return Err(RuleError::Malformed(rule.trim().to_string()));
    }
    Ok(raw)
}

fn parse_capability_list(value: &str) -> Result<BTreeSet<Capability>, RuleError> {
    value
        .split('|')
        .map(|token| {
            Capability::from_token(token)
                .ok_or_else(|| RuleError::UnknownCapability(token.trim().to_string()))
        })
        .collect()
}

fn parse_cause_list(key: &'static str, value: &str) -> Result<BTreeSet<FailCause>, RuleError> {
    value
        .split('|')
        .map(|token| {
            let token = token.trim();
            token.parse::<FailCause>().map_err(|_| RuleError::InvalidNumber {
                key,
                value: token.to_string(),
            })
        })
        .collect()
}

fn parse_interval_list(value: &str) -> Result<Vec<u64>, RuleError> {
    value
        .split('|')
        .map(|token| {
            let token = token.trim();
            let millis: i64 = token.parse().map_err(|_| RuleError::InvalidNumber {
                key: "retry_interval",
                value: token.to_string(),
            })?;
            if millis < 0 {
                return Err(RuleError::NegativeValue {
                    key: "retry_interval",
                    value: millis,
                });
            }
            Ok(millis as u64)
        })
        .collect()
}

fn parse_max_retries(value: &str) -> Result<u32, RuleError> {
    let count: i64 = value.parse().map_err(|_| RuleError::InvalidNumber {
        key: "maximum_retries",
        value: value.to_string(),
    })?;
    if count < 0 {
        return Err(RuleError::NegativeValue {
            key: "maximum_retries",
            value: count,
        });
    }
    Ok(count as u32)
}
