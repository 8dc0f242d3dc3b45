//! Retry entries and their state machine.
//!
//! One entry represents one scheduled retry attempt (setup or handover). The
//! scheduler exclusively owns the entry list; callbacks receive clones, and
//! outcomes flow back by entry id.

use crate::rule::{HandoverRetryRule, SetupRetryRule};
use crate::types::{DataNetworkInfo, DataProfile, RequestList, Transport};

/// Monotonic identifier assigned by the scheduler.
pub type RetryEntryId = u64;

/// Lifecycle of a retry entry.
///
/// ```text
/// NotRetried --fires, failure reported--> Failed --rescheduled--> NotRetried
/// NotRetried --fires, success reported--> Succeeded (terminal)
/// NotRetried | Failed --cancel--> Cancelled (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    NotRetried,
    Failed,
    Succeeded,
    Cancelled,
}

impl RetryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: RetryState) -> bool {
        match self {
            Self::NotRetried => next != Self::NotRetried,
            Self::Failed => matches!(next, Self::NotRetried | Self::Cancelled),
            Self::Succeeded | Self::Cancelled => false,
        }
    }
}

/// Why a setup retry was scheduled: retry the exact profile (network-suggested
/// delay or unthrottle revival), or re-run the request list with profile
/// selection left to the orchestrator (rule-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupRetryType {
    DataProfile,
    NetworkRequests,
}

/// One scheduled setup retry attempt.
#[derive(Debug, Clone)]
pub struct SetupRetryEntry {
    pub id: RetryEntryId,
    pub(crate) state: RetryState,
    pub setup_retry_type: SetupRetryType,
    /// Set for `DataProfile`-type retries; rule-based retries leave the
    /// profile choice to the orchestrator.
    pub data_profile: Option<DataProfile>,
    pub request_list: RequestList,
    pub transport: Transport,
    pub retry_delay_millis: u64,
    /// None when a network-suggested delay bypassed rule matching.
    pub applied_rule: Option<SetupRetryRule>,
}

impl SetupRetryEntry {
    pub fn state(&self) -> RetryState {
        self.state
    }
}

/// One scheduled handover retry attempt for a live data network.
#[derive(Debug, Clone)]
pub struct HandoverRetryEntry {
    pub id: RetryEntryId,
    pub(crate) state: RetryState,
    pub network: DataNetworkInfo,
    pub retry_delay_millis: u64,
    pub applied_rule: Option<HandoverRetryRule>,
}

impl HandoverRetryEntry {
    pub fn state(&self) -> RetryState {
        self.state
    }
}

/// A scheduled retry attempt of either kind.
#[derive(Debug, Clone)]
pub enum RetryEntry {
    Setup(SetupRetryEntry),
    Handover(HandoverRetryEntry),
}

impl RetryEntry {
    pub fn id(&self) -> RetryEntryId {
        match self {
            Self::Setup(e) => e.id,
            Self::Handover(e) => e.id,
        }
    }

    pub fn state(&self) -> RetryState {
        match self {
            Self::Setup(e) => e.state,
            Self::Handover(e) => e.state,
        }
    }

    /// Apply a state transition; invalid transitions (anything out of a
    /// terminal state) are ignored.
    pub(crate) fn set_state(&mut self, next: RetryState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::debug!(
                id = self.id(),
                ?current,
                ?next,
                "ignoring invalid retry state transition"
            );
            return false;
        }
        match self {
            Self::Setup(e) => e.state = next,
            Self::Handover(e) => e.state = next,
        }
        true
    }
}
