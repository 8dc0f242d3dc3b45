//! Setup and handover retry evaluation.

use crate::entry::{
    HandoverRetryEntry, RetryEntry, RetryEntryId, RetryState, SetupRetryEntry, SetupRetryType,
};
use crate::rule::{FailCause, HandoverRetryRule, SetupRetryRule, DEFAULT_RETRY_INTERVAL_MS};
use crate::throttle::{RetryType, ThrottleExpiry, ThrottleRecord, ThrottleStatus};
use crate::types::{
    Capability, DataNetworkInfo, DataProfile, NetworkRequest, RequestList, SuggestedRetry,
    Transport,
};

use super::queue::Event;
use super::RetryScheduler;

/// Capability a throttle record is keyed by: the profile's primary
/// capability, falling back to the first request's.
pub(super) fn throttle_capability(profile: &DataProfile, requests: &RequestList) -> Capability {
    profile
        .primary_capability()
        .or_else(|| requests.first().and_then(NetworkRequest::primary_capability))
        .unwrap_or(Capability::Internet)
}

impl RetryScheduler {
    /// Decide whether and when to retry a failed data network setup attempt.
    ///
    /// A network-suggested duration overrides rule matching entirely; a
    /// suggested "never retry" publishes a permanent throttle and schedules
    /// nothing.
    pub fn evaluate_setup_retry(
        &mut self,
        data_profile: &DataProfile,
        transport: Transport,
        request_list: &RequestList,
        fail_cause: FailCause,
        suggested: SuggestedRetry,
    ) {
        match suggested {
            SuggestedRetry::Never => {
                tracing::info!(
                    apn = %data_profile.apn_name, %transport,
                    "network suggested never retrying data setup"
                );
                let capability = throttle_capability(data_profile, request_list);
                let status = self.throttle.upsert(ThrottleRecord {
                    capability,
                    transport,
                    retry_type: RetryType::None,
                    expiry: ThrottleExpiry::Never,
                    data_profile: Some(data_profile.clone()),
                    request_list: request_list.clone(),
                });
                self.publish_throttle(vec![status]);
            }
            SuggestedRetry::AfterMillis(delay_millis) => {
                let capability = throttle_capability(data_profile, request_list);
                let until = self.now_millis() + delay_millis;
                let status = self.throttle.upsert(ThrottleRecord {
                    capability,
                    transport,
                    retry_type: RetryType::NewConnection,
                    expiry: ThrottleExpiry::Until(until),
                    data_profile: Some(data_profile.clone()),
                    request_list: request_list.clone(),
                });
                self.publish_throttle(vec![status]);
                self.schedule_setup_retry(
                    SetupRetryType::DataProfile,
                    Some(data_profile.clone()),
                    request_list.clone(),
                    transport,
                    delay_millis,
                    None,
                );
            }
            SuggestedRetry::Undefined => {
                self.evaluate_setup_retry_by_rule(data_profile, transport, request_list, fail_cause);
            }
        }
    }

    fn evaluate_setup_retry_by_rule(
        &mut self,
        data_profile: &DataProfile,
        transport: Transport,
        request_list: &RequestList,
        fail_cause: FailCause,
    ) {
        let Some(capability) = request_list
            .first()
            .and_then(NetworkRequest::primary_capability)
        else {
            tracing::warn!(
                apn = %data_profile.apn_name,
                "setup retry evaluated without a usable network request"
            );
            return;
        };
        let Some(rule) = self
            .setup_rules
            .iter()
            .find(|r| r.can_be_matched(capability, fail_cause))
            .cloned()
        else {
            tracing::info!(%capability, fail_cause, "no setup retry rule matched, stopping retry");
            let status = self.throttle.upsert(ThrottleRecord {
                capability,
                transport,
                retry_type: RetryType::None,
                expiry: ThrottleExpiry::Never,
                data_profile: Some(data_profile.clone()),
                request_list: request_list.clone(),
            });
            self.publish_throttle(vec![status]);
            return;
        };

        if rule.is_permanent_fail_cause_rule() {
            self.profiles
                .mark_permanently_failed(&data_profile.apn_name, true);
            tracing::info!(
                apn = %data_profile.apn_name, fail_cause,
                "fail cause is permanent for this profile"
            );
            // Permanent failure only binds the failed profile; the request is
            // still retried when another profile can carry it.
            let request = &request_list[0];
            if !self
                .profiles
                .has_alternative_profile(request, &data_profile.apn_name)
            {
                tracing::info!(
                    apn = %data_profile.apn_name,
                    "no alternative profile can satisfy the request, not retrying"
                );
                return;
            }
            let delay = rule.retry_intervals_millis()[0];
            self.schedule_setup_retry(
                SetupRetryType::NetworkRequests,
                None,
                request_list.clone(),
                transport,
                delay,
                Some(rule),
            );
            return;
        }

        let failed_count = self.setup_failed_count(capability, &rule, transport);
        if failed_count >= rule.max_retries() as usize {
            tracing::info!(%capability, failed_count, "data setup retried too many times, stopping");
            let status = self.throttle.upsert(ThrottleRecord {
                capability,
                transport,
                retry_type: RetryType::None,
                expiry: ThrottleExpiry::Never,
                data_profile: Some(data_profile.clone()),
                request_list: request_list.clone(),
            });
            self.publish_throttle(vec![status]);
            return;
        }

        let delay = rule.interval_for_attempt(failed_count);
        let until = self.now_millis() + delay;
        let status = self.throttle.upsert(ThrottleRecord {
            capability,
            transport,
            retry_type: RetryType::NewConnection,
            expiry: ThrottleExpiry::Until(until),
            data_profile: None,
            request_list: request_list.clone(),
        });
        self.publish_throttle(vec![status]);
        self.schedule_setup_retry(
            SetupRetryType::NetworkRequests,
            None,
            request_list.clone(),
            transport,
            delay,
            Some(rule),
        );
    }

    /// Decide whether and when to retry a failed handover attempt for
    /// `network`. Throttle records target the handover target transport.
    pub fn evaluate_handover_retry(
        &mut self,
        network: &DataNetworkInfo,
        fail_cause: FailCause,
        suggested: SuggestedRetry,
    ) {
        let target = network.transport.other();
        let capability = throttle_capability(&network.data_profile, &network.request_list);
        match suggested {
            SuggestedRetry::Never => {
                tracing::info!(network = network.id, "network suggested never retrying handover");
                let status = self.throttle.upsert(ThrottleRecord {
                    capability,
                    transport: target,
                    retry_type: RetryType::None,
                    expiry: ThrottleExpiry::Never,
                    data_profile: Some(network.data_profile.clone()),
                    request_list: network.request_list.clone(),
                });
                self.publish_throttle(vec![status]);
            }
            SuggestedRetry::AfterMillis(delay_millis) => {
                let until = self.now_millis() + delay_millis;
                let status = self.throttle.upsert(ThrottleRecord {
                    capability,
                    transport: target,
                    retry_type: RetryType::Handover,
                    expiry: ThrottleExpiry::Until(until),
                    data_profile: Some(network.data_profile.clone()),
                    request_list: network.request_list.clone(),
                });
                self.publish_throttle(vec![status]);
                self.schedule_handover_retry(network.clone(), delay_millis, None);
            }
            SuggestedRetry::Undefined => {
                let Some(rule) = self
                    .handover_rules
                    .iter()
                    .find(|r| r.can_be_matched(fail_cause))
                    .cloned()
                else {
                    tracing::info!(
                        fail_cause,
                        "no handover retry rule matched, retrying once after the default interval"
                    );
                    self.schedule_handover_retry(network.clone(), DEFAULT_RETRY_INTERVAL_MS, None);
                    return;
                };
                let failed_count = self.handover_failed_count(network.id, &rule);
                if failed_count >= rule.max_retries() as usize {
                    tracing::info!(
                        network = network.id, failed_count,
                        "handover retried too many times, stopping"
                    );
                    let status = self.throttle.upsert(ThrottleRecord {
                        capability,
                        transport: target,
                        retry_type: RetryType::None,
                        expiry: ThrottleExpiry::Never,
                        data_profile: Some(network.data_profile.clone()),
                        request_list: network.request_list.clone(),
                    });
                    self.publish_throttle(vec![status]);
                    return;
                }
                let delay = rule.interval_for_attempt(failed_count);
                let until = self.now_millis() + delay;
                let status = self.throttle.upsert(ThrottleRecord {
                    capability,
                    transport: target,
                    retry_type: RetryType::Handover,
                    expiry: ThrottleExpiry::Until(until),
                    data_profile: Some(network.data_profile.clone()),
                    request_list: network.request_list.clone(),
                });
                self.publish_throttle(vec![status]);
                self.schedule_handover_retry(network.clone(), delay, Some(rule));
            }
        }
    }

    /// Cancel any pending handover retry for `network_id` and unthrottle the
    /// handover target transport.
    pub fn cancel_pending_handover_retry(&mut self, network_id: u64) {
        let mut pending: Vec<(RetryEntryId, Capability, Transport)> = Vec::new();
        for entry in &self.entries {
            if let RetryEntry::Handover(h) = entry {
                if h.network.id == network_id && h.state() == RetryState::NotRetried {
                    pending.push((
                        h.id,
                        throttle_capability(&h.network.data_profile, &h.network.request_list),
                        h.network.transport.other(),
                    ));
                }
            }
        }
        if pending.is_empty() {
            return;
        }
        let mut statuses = Vec::new();
        for (id, capability, target) in pending {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) {
                entry.set_state(RetryState::Cancelled);
            }
            self.throttle.remove(capability, target);
            statuses.push(ThrottleStatus {
                capability,
                retry_type: RetryType::Handover,
                expiry: ThrottleExpiry::UnthrottledNow,
                transport: target,
            });
        }
        statuses.dedup();
        tracing::info!(network = network_id, "cancelled pending handover retry");
        self.publish_throttle(statuses);
    }

    /// Whether any handover retry is still pending for `network_id`.
    pub fn is_any_handover_retry_scheduled(&self, network_id: u64) -> bool {
        self.entries.iter().any(|e| {
            matches!(e, RetryEntry::Handover(h)
                if h.network.id == network_id && h.state() == RetryState::NotRetried)
        })
    }

    /// Whether an active rule-based setup retry already covers a compatible
    /// request on `transport`; used by the orchestrator to suppress duplicate
    /// requests while a retry is pending.
    pub fn is_similar_request_retry_scheduled(
        &self,
        request: &NetworkRequest,
        transport: Transport,
    ) -> bool {
        let Some(capability) = request.primary_capability() else {
            return false;
        };
        self.entries.iter().any(|e| match e {
            RetryEntry::Setup(s) => {
                s.state() == RetryState::NotRetried
                    && s.setup_retry_type == SetupRetryType::NetworkRequests
                    && s.transport == transport
                    && s.request_list.first().and_then(NetworkRequest::primary_capability)
                        == Some(capability)
            }
            RetryEntry::Handover(_) => false,
        })
    }

    /// Count rule-based setup entries for (capability, rule, transport),
    /// newest first, stopping at the first succeeded or cancelled entry: a
    /// success or cancellation resets the window.
    fn setup_failed_count(
        &self,
        capability: Capability,
        rule: &SetupRetryRule,
        transport: Transport,
    ) -> usize {
        let mut count = 0;
        for entry in self.entries.iter().rev() {
            let RetryEntry::Setup(entry) = entry else {
                continue;
            };
            if entry.setup_retry_type != SetupRetryType::NetworkRequests
                || entry.applied_rule.as_ref() != Some(rule)
                || entry.transport != transport
            {
                continue;
            }
            let matches_capability = entry
                .request_list
                .first()
                .and_then(NetworkRequest::primary_capability)
                == Some(capability);
            if !matches_capability {
                continue;
            }
            match entry.state() {
                RetryState::Succeeded | RetryState::Cancelled => break,
                RetryState::NotRetried | RetryState::Failed => count += 1,
            }
        }
        count
    }

    /// Count handover entries for (network, rule), newest first, stopping at
    /// the first succeeded or cancelled entry.
    fn handover_failed_count(&self, network_id: u64, rule: &HandoverRetryRule) -> usize {
        let mut count = 0;
        for entry in self.entries.iter().rev() {
            let RetryEntry::Handover(entry) = entry else {
                continue;
            };
            if entry.network.id != network_id || entry.applied_rule.as_ref() != Some(rule) {
                continue;
            }
            match entry.state() {
                RetryState::Succeeded | RetryState::Cancelled => break,
                RetryState::NotRetried | RetryState::Failed => count += 1,
            }
        }
        count
    }

    pub(crate) fn schedule_setup_retry(
        &mut self,
        setup_retry_type: SetupRetryType,
        data_profile: Option<DataProfile>,
        request_list: RequestList,
        transport: Transport,
        retry_delay_millis: u64,
        applied_rule: Option<SetupRetryRule>,
    ) -> RetryEntryId {
        let id = self.allocate_id();
        tracing::debug!(id, delay_millis = retry_delay_millis, %transport, "scheduling data setup retry");
        self.entries.push(RetryEntry::Setup(SetupRetryEntry {
            id,
            state: RetryState::NotRetried,
            setup_retry_type,
            data_profile,
            request_list,
            transport,
            retry_delay_millis,
            applied_rule,
        }));
        self.arm_timer(Event::SetupRetryDue(id), id, retry_delay_millis);
        id
    }

    fn schedule_handover_retry(
        &mut self,
        network: DataNetworkInfo,
        retry_delay_millis: u64,
        applied_rule: Option<HandoverRetryRule>,
    ) -> RetryEntryId {
        let id = self.allocate_id();
        tracing::debug!(id, delay_millis = retry_delay_millis, network = network.id, "scheduling handover retry");
        self.entries.push(RetryEntry::Handover(HandoverRetryEntry {
            id,
            state: RetryState::NotRetried,
            network,
            retry_delay_millis,
            applied_rule,
        }));
        self.arm_timer(Event::HandoverRetryDue(id), id, retry_delay_millis);
        id
    }
}
