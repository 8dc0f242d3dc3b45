//! The retry scheduler: owns retry entries, installed rules, the event queue,
//! and throttle state; decides whether, when, and how failed setup and
//! handover attempts are retried.
//!
//! All operations execute on one logical thread. Timer firing never races
//! with mutation, which is why the fire-time state check ("drop unless
//! NotRetried") is sufficient instead of locks.

mod evaluate;
mod queue;
mod reset;
mod timer;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::callback::RetryCallback;
use crate::clock::Clock;
use crate::config::RelinkConfig;
use crate::entry::{RetryEntry, RetryEntryId, RetryState};
use crate::rule::{self, HandoverRetryRule, RuleError, SetupRetryRule};
use crate::throttle::{ThrottleStatus, ThrottleTracker};
use crate::types::ProfileStore;

pub use timer::WakeAlarm;

use queue::{Event, EventQueue};

pub struct RetryScheduler {
    setup_rules: Vec<SetupRetryRule>,
    handover_rules: Vec<HandoverRetryRule>,
    long_timer_threshold_millis: u64,
    prefer_wake_alarms: bool,
    unthrottle_check_transport: bool,
    reset_throttling_on_tac_change: bool,
    entries: Vec<RetryEntry>,
    next_id: RetryEntryId,
    queue: EventQueue,
    throttle: ThrottleTracker,
    clock: Arc<dyn Clock>,
    alarm: Box<dyn WakeAlarm>,
    profiles: Box<dyn ProfileStore>,
    callback: Box<dyn RetryCallback>,
}

impl RetryScheduler {
    /// Build a scheduler from a validated configuration. Fails if any rule
    /// string is malformed; a partial rule set is never installed.
    pub fn new(
        config: &RelinkConfig,
        clock: Arc<dyn Clock>,
        alarm: Box<dyn WakeAlarm>,
        profiles: Box<dyn ProfileStore>,
        callback: Box<dyn RetryCallback>,
    ) -> Result<Self, RuleError> {
        let setup_rules = rule::parse_setup_rules(&config.setup_retry_rules)?;
        let handover_rules = rule::parse_handover_rules(&config.handover_retry_rules)?;
        Ok(Self {
            setup_rules,
            handover_rules,
            long_timer_threshold_millis: config.long_retry_timer_threshold_millis,
            prefer_wake_alarms: config.prefer_wake_alarms,
            unthrottle_check_transport: config.unthrottle_check_transport,
            reset_throttling_on_tac_change: config.reset_throttling_on_tac_change,
            entries: Vec::new(),
            next_id: 0,
            queue: EventQueue::default(),
            throttle: ThrottleTracker::default(),
            clock,
            alarm,
            profiles,
            callback,
        })
    }

    /// Read-only view of every retry entry, oldest first. Cancelled and
    /// succeeded entries remain visible; only the active ones count toward
    /// retry suppression.
    pub fn list_retries(&self) -> &[RetryEntry] {
        &self.entries
    }

    /// Process every ready event in arrival order.
    pub fn drain(&mut self) {
        while let Some(event) = self.queue.pop_ready() {
            self.handle_event(event);
        }
    }

    /// Promote timers that are due per the engine clock, then drain.
    pub fn drain_due(&mut self) {
        let now = self.clock.now_millis();
        self.queue.promote_due(now);
        self.drain();
    }

    /// Earliest pending in-process timer deadline (engine-clock milliseconds).
    pub fn next_timer_due(&self) -> Option<u64> {
        self.queue.next_due()
    }

    /// Deliver a wake-alarm firing for `entry`.
    pub fn fire_entry(&mut self, entry: RetryEntryId) {
        let event = self
            .entries
            .iter()
            .find(|e| e.id() == entry)
            .map(|e| match e {
                RetryEntry::Setup(_) => Event::SetupRetryDue(entry),
                RetryEntry::Handover(_) => Event::HandoverRetryDue(entry),
            });
        match event {
            Some(event) => self.handle_event(event),
            None => tracing::debug!(entry, "wake alarm fired for unknown retry entry"),
        }
    }

    /// Report the outcome of a fired retry attempt (or cancel a pending one).
    /// Transitions out of a terminal state are ignored.
    pub fn report_retry_result(&mut self, entry: RetryEntryId, state: RetryState) {
        match self.entries.iter_mut().find(|e| e.id() == entry) {
            Some(found) => {
                found.set_state(state);
            }
            None => tracing::debug!(entry, "retry result for unknown entry"),
        }
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub(crate) fn allocate_id(&mut self) -> RetryEntryId {
        self.next_id += 1;
        self.next_id
    }

    /// One callback emission per triggering event; empty changes emit nothing.
    pub(crate) fn publish_throttle(&mut self, statuses: Vec<ThrottleStatus>) {
        if statuses.is_empty() {
            return;
        }
        tracing::info!(count = statuses.len(), "throttle status changed");
        self.callback.on_throttle_status_changed(&statuses);
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::SetupRetryDue(id) => self.on_setup_retry_due(id),
            Event::HandoverRetryDue(id) => self.on_handover_retry_due(id),
        }
    }

    fn on_setup_retry_due(&mut self, id: RetryEntryId) {
        let snapshot = match self.entries.iter().find(|e| e.id() == id) {
            Some(RetryEntry::Setup(entry)) if entry.state() == RetryState::NotRetried => {
                entry.clone()
            }
            Some(entry) => {
                tracing::debug!(id, state = ?entry.state(), "dropping stale setup retry firing");
                return;
            }
            None => {
                tracing::debug!(id, "setup retry timer fired for unknown entry");
                return;
            }
        };
        tracing::info!(id, transport = %snapshot.transport, "data setup retry due");
        self.callback.on_setup_retry(&snapshot);
    }

    fn on_handover_retry_due(&mut self, id: RetryEntryId) {
        let snapshot = match self.entries.iter().find(|e| e.id() == id) {
            Some(RetryEntry::Handover(entry)) if entry.state() == RetryState::NotRetried => {
                entry.clone()
            }
            Some(entry) => {
                tracing::debug!(id, state = ?entry.state(), "dropping stale handover retry firing");
                return;
            }
            None => {
                tracing::debug!(id, "handover retry timer fired for unknown entry");
                return;
            }
        };
        tracing::info!(id, network = snapshot.network.id, "data handover retry due");
        self.callback.on_handover_retry(&snapshot);
    }
}
