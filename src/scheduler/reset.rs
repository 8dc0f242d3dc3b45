//! External reset and unthrottle signal handling.

use crate::config::RelinkConfig;
use crate::entry::{RetryEntry, RetryState, SetupRetryType};
use crate::rule::{self, RuleError};
use crate::throttle::{RetryType, ThrottleExpiry, ThrottleStatus};
use crate::types::{DataProfile, NetworkRequest, RequestList, Transport};

use super::evaluate::throttle_capability;
use super::RetryScheduler;

/// Why all throttling state was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResetReason {
    RadioOn,
    ModemReset,
    TrackingAreaChanged,
    ConfigChanged,
}

impl RetryScheduler {
    /// Modem reported `profile` no longer throttled on `transport`.
    ///
    /// Cancels that transport's pending setup retries for the profile, clears
    /// its permanent-failure flag, publishes an unthrottle record, and, when
    /// the profile is still wanted, immediately schedules a zero-delay retry
    /// with the retained request list. Unknown profiles are a no-op.
    pub fn on_profile_unthrottled(&mut self, profile: &DataProfile, transport: Transport) {
        let transport_filter = if self.unthrottle_check_transport {
            Some(transport)
        } else {
            None
        };
        let removed = self.throttle.take_for_profile(profile, transport_filter);

        let mut revived_requests: RequestList = Vec::new();
        let mut stored_profile: Option<DataProfile> = None;
        let mut cancelled_any = false;
        for entry in self.entries.iter_mut() {
            let RetryEntry::Setup(s) = entry else {
                continue;
            };
            if s.state() != RetryState::NotRetried {
                continue;
            }
            if transport_filter.map_or(false, |t| s.transport != t) {
                continue;
            }
            if !s
                .data_profile
                .as_ref()
                .map_or(false, |p| p.is_same_apn(profile))
            {
                continue;
            }
            if revived_requests.is_empty() {
                revived_requests = s.request_list.clone();
            }
            if stored_profile.is_none() {
                stored_profile = s.data_profile.clone();
            }
            s.state = RetryState::Cancelled;
            cancelled_any = true;
        }

        if removed.is_empty() && !cancelled_any {
            tracing::debug!(apn = %profile.apn_name, %transport, "unthrottle for unknown profile, ignoring");
            return;
        }

        tracing::info!(apn = %profile.apn_name, %transport, "data profile unthrottled");
        self.profiles
            .mark_permanently_failed(&profile.apn_name, false);

        let capability = removed
            .first()
            .map(|r| r.capability)
            .unwrap_or_else(|| throttle_capability(profile, &revived_requests));
        self.publish_throttle(vec![ThrottleStatus {
            capability,
            retry_type: RetryType::NewConnection,
            expiry: ThrottleExpiry::UnthrottledNow,
            transport,
        }]);

        if revived_requests.is_empty() {
            revived_requests = removed
                .iter()
                .find(|r| !r.request_list.is_empty())
                .map(|r| r.request_list.clone())
                .unwrap_or_default();
        }
        if revived_requests.is_empty() {
            tracing::debug!(apn = %profile.apn_name, "profile no longer wanted, skipping revival retry");
            return;
        }
        let revived_profile = stored_profile
            .or_else(|| removed.iter().find_map(|r| r.data_profile.clone()))
            .unwrap_or_else(|| profile.clone());
        self.schedule_setup_retry(
            SetupRetryType::DataProfile,
            Some(revived_profile),
            revived_requests,
            transport,
            0,
            None,
        );
    }

    /// Radio stack restarted; drop all throttling state.
    pub fn on_radio_on(&mut self) {
        self.reset_throttling(ResetReason::RadioOn);
    }

    /// Modem reset; drop all throttling state.
    pub fn on_modem_reset(&mut self) {
        self.reset_throttling(ResetReason::ModemReset);
    }

    /// Tracking area changed; drops throttling state only when configured to.
    pub fn on_tracking_area_changed(&mut self) {
        if !self.reset_throttling_on_tac_change {
            tracing::debug!("tracking area changed, throttling reset disabled by config");
            return;
        }
        self.reset_throttling(ResetReason::TrackingAreaChanged);
    }

    /// A data network using `profile` connected on `transport`: clear the
    /// profile's permanent failure and reset the counter of the rule that
    /// produced the connection.
    pub fn on_data_network_connected(&mut self, transport: Transport, profile: &DataProfile) {
        tracing::debug!(apn = %profile.apn_name, %transport, "data network connected");
        self.profiles
            .mark_permanently_failed(&profile.apn_name, false);
        let capability = profile.primary_capability();
        // The newest matching rule-based entry; marking it succeeded stops
        // the failed-count scan there.
        let newest = self.entries.iter_mut().rev().find(|e| match e {
            RetryEntry::Setup(s) => {
                !s.state().is_terminal()
                    && s.transport == transport
                    && s.setup_retry_type == SetupRetryType::NetworkRequests
                    && s.request_list.first().and_then(NetworkRequest::primary_capability)
                        == capability
            }
            RetryEntry::Handover(_) => false,
        });
        if let Some(entry) = newest {
            entry.set_state(RetryState::Succeeded);
        }
    }

    /// Install a new configuration. On any rule parse error the previously
    /// installed rule set stays fully in effect and the error is returned.
    /// A successful install drops all derived retry and throttle state.
    pub fn update_config(&mut self, config: &RelinkConfig) -> Result<(), RuleError> {
        let setup_rules = match rule::parse_setup_rules(&config.setup_retry_rules) {
            Ok(rules) => rules,
            Err(error) => {
                tracing::warn!(%error, "rejecting invalid setup retry rules, keeping previous set");
                return Err(error);
            }
        };
        let handover_rules = match rule::parse_handover_rules(&config.handover_retry_rules) {
            Ok(rules) => rules,
            Err(error) => {
                tracing::warn!(%error, "rejecting invalid handover retry rules, keeping previous set");
                return Err(error);
            }
        };
        self.setup_rules = setup_rules;
        self.handover_rules = handover_rules;
        self.long_timer_threshold_millis = config.long_retry_timer_threshold_millis;
        self.prefer_wake_alarms = config.prefer_wake_alarms;
        self.unthrottle_check_transport = config.unthrottle_check_transport;
        self.reset_throttling_on_tac_change = config.reset_throttling_on_tac_change;
        self.reset_throttling(ResetReason::ConfigChanged);
        Ok(())
    }

    /// Cancel every non-terminal entry, unthrottle every blocked record, and
    /// clear all permanent failures. Cancellation also resets the derived
    /// per-rule retry counters.
    fn reset_throttling(&mut self, reason: ResetReason) {
        tracing::info!(?reason, "resetting data retry and throttling state");
        for entry in self.entries.iter_mut() {
            if !entry.state().is_terminal() {
                entry.set_state(RetryState::Cancelled);
            }
        }
        let statuses: Vec<ThrottleStatus> = self
            .throttle
            .drain_all()
            .into_iter()
            .map(|record| ThrottleStatus {
                capability: record.capability,
                retry_type: RetryType::NewConnection,
                expiry: ThrottleExpiry::UnthrottledNow,
                transport: record.transport,
            })
            .collect();
        self.profiles.clear_all_permanent_failures();
        self.publish_throttle(statuses);
    }
}
