//! Collaborator-facing callbacks.

use crate::entry::{HandoverRetryEntry, SetupRetryEntry};
use crate::throttle::ThrottleStatus;

/// Callbacks the engine delivers on its own event loop.
///
/// `on_setup_retry` / `on_handover_retry` hand over a snapshot of the fired
/// entry; the receiver performs the actual attempt and reports the terminal
/// outcome through `RetryScheduler::report_retry_result`. A throttle change
/// carries every record that changed for the triggering event, exactly once.
pub trait RetryCallback: Send {
    fn on_setup_retry(&mut self, entry: &SetupRetryEntry);
    fn on_handover_retry(&mut self, entry: &HandoverRetryEntry);
    fn on_throttle_status_changed(&mut self, statuses: &[ThrottleStatus]);
}
