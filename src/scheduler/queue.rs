//! Typed event queue: ready FIFO plus due-time ordered timers.
//!
//! Timer promotion is explicit (`promote_due`) so the driver (the service
//! loop or a test harness) controls when time advances. Events whose due
//! time has already passed go straight to the ready queue.

use std::collections::VecDeque;

use crate::entry::RetryEntryId;

/// Events processed by the scheduler in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    /// A setup retry timer fired.
    SetupRetryDue(RetryEntryId),
    /// A handover retry timer fired.
    HandoverRetryDue(RetryEntryId),
}

#[derive(Debug)]
struct TimerSlot {
    due_at_millis: u64,
    seq: u64,
    event: Event,
}

/// In-process deferred-execution queue.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    ready: VecDeque<Event>,
    timers: Vec<TimerSlot>,
    seq: u64,
}

impl EventQueue {
    pub fn post(&mut self, event: Event) {
        self.ready.push_back(event);
    }

    /// Defer `event` until `due_at_millis`.
    pub fn post_delayed(&mut self, event: Event, due_at_millis: u64, now_millis: u64) {
        if due_at_millis <= now_millis {
            self.post(event);
            return;
        }
        self.seq += 1;
        self.timers.push(TimerSlot {
            due_at_millis,
            seq: self.seq,
            event,
        });
    }

    pub fn pop_ready(&mut self) -> Option<Event> {
        self.ready.pop_front()
    }

    /// Earliest pending timer deadline.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_at_millis).min()
    }

    /// Move timers whose deadline has arrived to the ready queue, earliest
    /// deadline first (insertion order breaks ties).
    pub fn promote_due(&mut self, now_millis: u64) {
        let mut due: Vec<TimerSlot> = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].due_at_millis <= now_millis {
                due.push(self.timers.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|t| (t.due_at_millis, t.seq));
        for slot in due {
            self.ready.push_back(slot.event);
        }
    }
}
