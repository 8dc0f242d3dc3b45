//! Timer arming: short delays on the in-process queue, long delays on the OS
//! wake alarm so a pending retry survives deep sleep.

use crate::entry::RetryEntryId;

use super::queue::Event;
use super::RetryScheduler;

/// OS-level exact wake alarm. Implementations must deliver the firing back on
/// the engine's event loop as a `RetryScheduler::fire_entry` call; the engine
/// never blocks on an alarm.
pub trait WakeAlarm: Send {
    fn schedule_exact_wake(&mut self, delay_millis: u64, entry: RetryEntryId);
}

impl RetryScheduler {
    /// Exactly one of the two timer paths is armed per entry.
    pub(crate) fn arm_timer(&mut self, event: Event, entry: RetryEntryId, delay_millis: u64) {
        if delay_millis >= self.long_timer_threshold_millis || self.prefer_wake_alarms {
            tracing::debug!(entry, delay_millis, "arming retry via wake alarm");
            self.alarm.schedule_exact_wake(delay_millis, entry);
            return;
        }
        let now = self.now_millis();
        self.queue.post_delayed(event, now + delay_millis, now);
    }
}
