//! Retry rules: a small operator-configured language selecting backoff
//! schedules by capability and fail cause.
//!
//! Rules are parsed from comma-separated `key=value[|value...]` strings, e.g.
//!
//! ```text
//! capabilities=internet|mms|supl, fail_causes=8|27|-5, retry_interval=2000|4000, maximum_retries=4
//! permanent_fail_causes=8|27, retry_interval=2500
//! ```
//!
//! and evaluated in list order, first match wins: list order is a priority
//! order configured externally.

mod handover;
mod parse;
mod setup;

pub use handover::HandoverRetryRule;
pub use parse::RuleError;
pub use setup::SetupRetryRule;

/// Integer code describing why a setup/handover attempt failed.
pub type FailCause = i32;

/// Retry attempt cap when `maximum_retries` is unspecified.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 10;

/// Backoff interval when `retry_interval` is unspecified.
pub(crate) const DEFAULT_RETRY_INTERVAL_MS: u64 = 5000;

/// Parse an ordered setup rule list; any invalid string rejects the whole set.
pub fn parse_setup_rules(strings: &[String]) -> Result<Vec<SetupRetryRule>, RuleError> {
    strings.iter().map(|s| s.parse()).collect()
}

/// Parse an ordered handover rule list; any invalid string rejects the whole set.
pub fn parse_handover_rules(strings: &[String]) -> Result<Vec<HandoverRetryRule>, RuleError> {
    strings.iter().map(|s| s.parse()).collect()
}
