//! Async embedding of the scheduler: a command channel plus a single task
//! driving the event queue and timers.
//!
//! The scheduler itself is a plain single-threaded state machine; this layer
//! gives it the event loop of the concurrency model: collaborator commands,
//! in-process timer deadlines, and wake-alarm firings all funnel into one
//! task, which is the only mutator. Callbacks run synchronously on that task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::callback::RetryCallback;
use crate::clock::Clock;
use crate::config::RelinkConfig;
use crate::entry::{RetryEntryId, RetryState};
use crate::rule::{FailCause, RuleError};
use crate::scheduler::{RetryScheduler, WakeAlarm};
use crate::types::{DataNetworkInfo, DataProfile, ProfileStore, RequestList, SuggestedRetry, Transport};

/// Operations accepted by the engine task, processed in arrival order.
#[derive(Debug)]
pub enum Command {
    EvaluateSetup {
        data_profile: DataProfile,
        transport: Transport,
        request_list: RequestList,
        fail_cause: FailCause,
        suggested: SuggestedRetry,
    },
    EvaluateHandover {
        network: DataNetworkInfo,
        fail_cause: FailCause,
        suggested: SuggestedRetry,
    },
    CancelHandoverRetry {
        network_id: u64,
    },
    ReportRetryResult {
        entry: RetryEntryId,
        state: RetryState,
    },
    ProfileUnthrottled {
        data_profile: DataProfile,
        transport: Transport,
    },
    DataNetworkConnected {
        transport: Transport,
        data_profile: DataProfile,
    },
    RadioOn,
    ModemReset,
    TrackingAreaChanged,
    ConfigChanged(RelinkConfig),
    /// Wake-alarm firing routed back onto the engine task.
    Fire(RetryEntryId),
}

/// Cloneable handle collaborators use to talk to a running [`RetryService`].
#[derive(Debug, Clone)]
pub struct RetryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RetryHandle {
    pub fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("retry service is gone, dropping command");
        }
    }

    pub fn evaluate_setup_retry(
        &self,
        data_profile: DataProfile,
        transport: Transport,
        request_list: RequestList,
        fail_cause: FailCause,
        suggested: SuggestedRetry,
    ) {
        self.send(Command::EvaluateSetup {
            data_profile,
            transport,
            request_list,
            fail_cause,
            suggested,
        });
    }

    pub fn report_retry_result(&self, entry: RetryEntryId, state: RetryState) {
        self.send(Command::ReportRetryResult { entry, state });
    }
}

/// Wake alarm backed by a tokio sleep task; adequate whenever the process does
/// not actually suspend. Embedders with a real OS alarm implement
/// [`WakeAlarm`] themselves and send [`Command::Fire`] on expiry.
#[derive(Debug, Clone)]
pub struct TokioWakeAlarm {
    tx: mpsc::UnboundedSender<Command>,
}

impl TokioWakeAlarm {
    pub fn new(handle: &RetryHandle) -> Self {
        Self {
            tx: handle.tx.clone(),
        }
    }
}

impl WakeAlarm for TokioWakeAlarm {
    fn schedule_exact_wake(&mut self, delay_millis: u64, entry: RetryEntryId) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_millis)).await;
            let _ = tx.send(Command::Fire(entry));
        });
    }
}

/// Owns the scheduler and its command channel.
pub struct RetryService {
    scheduler: RetryScheduler,
    clock: Arc<dyn Clock>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl RetryService {
    /// Build a service plus its handle. The wake alarm is constructed against
    /// the handle so long-delay firings re-enter the command channel.
    pub fn new(
        config: &RelinkConfig,
        clock: Arc<dyn Clock>,
        profiles: Box<dyn ProfileStore>,
        callback: Box<dyn RetryCallback>,
    ) -> Result<(Self, RetryHandle), RuleError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RetryHandle { tx };
        let alarm = Box::new(TokioWakeAlarm::new(&handle));
        let scheduler = RetryScheduler::new(config, clock.clone(), alarm, profiles, callback)?;
        Ok((Self { scheduler, clock, rx }, handle))
    }

    /// Run until all command senders are dropped. Commands and timer firings
    /// are processed strictly in arrival order on this task.
    pub async fn run(mut self) {
        loop {
            self.scheduler.drain_due();
            let sleep_millis = self
                .scheduler
                .next_timer_due()
                .map(|due| due.saturating_sub(self.clock.now_millis()));
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                },
                _ = sleep_for(sleep_millis) => {}
            }
        }
        tracing::debug!("retry service stopped");
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::EvaluateSetup {
                data_profile,
                transport,
                request_list,
                fail_cause,
                suggested,
            } => self.scheduler.evaluate_setup_retry(
                &data_profile,
                transport,
                &request_list,
                fail_cause,
                suggested,
            ),
            Command::EvaluateHandover {
                network,
                fail_cause,
                suggested,
            } => self
                .scheduler
                .evaluate_handover_retry(&network, fail_cause, suggested),
            Command::CancelHandoverRetry { network_id } => {
                self.scheduler.cancel_pending_handover_retry(network_id)
            }
            Command::ReportRetryResult { entry, state } => {
                self.scheduler.report_retry_result(entry, state)
            }
            Command::ProfileUnthrottled {
                data_profile,
                transport,
            } => self.scheduler.on_profile_unthrottled(&data_profile, transport),
            Command::DataNetworkConnected {
                transport,
                data_profile,
            } => self
                .scheduler
                .on_data_network_connected(transport, &data_profile),
            Command::RadioOn => self.scheduler.on_radio_on(),
            Command::ModemReset => self.scheduler.on_modem_reset(),
            Command::TrackingAreaChanged => self.scheduler.on_tracking_area_changed(),
            // update_config logs and keeps the previous rules on error.
            Command::ConfigChanged(config) => {
                let _ = self.scheduler.update_config(&config);
            }
            Command::Fire(entry) => self.scheduler.fire_entry(entry),
        }
        self.scheduler.drain();
    }
}

async fn sleep_for(millis: Option<u64>) {
    match millis {
        Some(millis) => tokio::time::sleep(Duration::from_millis(millis)).await,
        None => std::future::pending::<()>().await,
    }
}
