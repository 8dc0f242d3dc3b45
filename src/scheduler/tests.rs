//! Scenario tests for the retry scheduler.

use std::sync::{Arc, Mutex};

use crate::callback::RetryCallback;
use crate::clock::FakeClock;
use crate::config::RelinkConfig;
use crate::entry::{
    HandoverRetryEntry, RetryEntry, RetryEntryId, RetryState, SetupRetryEntry, SetupRetryType,
};
use crate::throttle::{RetryType, ThrottleExpiry, ThrottleStatus};
use crate::types::{
    Capability, DataNetworkInfo, DataProfile, InMemoryProfileStore, NetworkRequest, ProfileStore,
    SuggestedRetry, Transport,
};

use super::{RetryScheduler, WakeAlarm};

#[derive(Debug, Default)]
struct Recorded {
    setup: Vec<SetupRetryEntry>,
    handover: Vec<HandoverRetryEntry>,
    throttle: Vec<Vec<ThrottleStatus>>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Recorded>>);

impl Recorder {
    fn setup_entries(&self) -> Vec<SetupRetryEntry> {
        self.0.lock().unwrap().setup.clone()
    }

    fn handover_entries(&self) -> Vec<HandoverRetryEntry> {
        self.0.lock().unwrap().handover.clone()
    }

    fn throttle_events(&self) -> Vec<Vec<ThrottleStatus>> {
        self.0.lock().unwrap().throttle.clone()
    }

    fn clear(&self) {
        *self.0.lock().unwrap() = Recorded::default();
    }
}

impl RetryCallback for Recorder {
    fn on_setup_retry(&mut self, entry: &SetupRetryEntry) {
        self.0.lock().unwrap().setup.push(entry.clone());
    }

    fn on_handover_retry(&mut self, entry: &HandoverRetryEntry) {
        self.0.lock().unwrap().handover.push(entry.clone());
    }

    fn on_throttle_status_changed(&mut self, statuses: &[ThrottleStatus]) {
        self.0.lock().unwrap().throttle.push(statuses.to_vec());
    }
}

#[derive(Clone, Default)]
struct MockAlarm(Arc<Mutex<Vec<(u64, RetryEntryId)>>>);

impl MockAlarm {
    fn scheduled(&self) -> Vec<(u64, RetryEntryId)> {
        self.0.lock().unwrap().clone()
    }
}

impl WakeAlarm for MockAlarm {
    fn schedule_exact_wake(&mut self, delay_millis: u64, entry: RetryEntryId) {
        self.0.lock().unwrap().push((delay_millis, entry));
    }
}

#[derive(Clone)]
struct SharedStore(Arc<Mutex<InMemoryProfileStore>>);

impl SharedStore {
    fn is_failed(&self, apn_name: &str) -> bool {
        self.0.lock().unwrap().is_permanently_failed(apn_name)
    }

    fn mark_failed(&self, apn_name: &str) {
        self.0.lock().unwrap().mark_permanently_failed(apn_name, true);
    }
}

impl ProfileStore for SharedStore {
    fn mark_permanently_failed(&mut self, apn_name: &str, failed: bool) {
        self.0.lock().unwrap().mark_permanently_failed(apn_name, failed);
    }

    fn is_permanently_failed(&self, apn_name: &str) -> bool {
        self.0.lock().unwrap().is_permanently_failed(apn_name)
    }

    fn clear_all_permanent_failures(&mut self) {
        self.0.lock().unwrap().clear_all_permanent_failures();
    }

    fn has_alternative_profile(&self, request: &NetworkRequest, apn_name: &str) -> bool {
        self.0.lock().unwrap().has_alternative_profile(request, apn_name)
    }
}

struct Harness {
    scheduler: RetryScheduler,
    clock: Arc<FakeClock>,
    recorder: Recorder,
    alarms: MockAlarm,
    store: SharedStore,
}

impl Harness {
    /// Drain ready events, then repeatedly advance the clock to the earliest
    /// pending timer and drain again, until no timers remain.
    fn process_all_future_messages(&mut self) {
        self.scheduler.drain();
        while let Some(due) = self.scheduler.next_timer_due() {
            self.clock.set(due);
            self.scheduler.drain_due();
        }
    }
}

fn profile1() -> DataProfile {
    DataProfile::new("fake_apn1", [Capability::Internet, Capability::Supl])
}

fn profile2() -> DataProfile {
    DataProfile::new(
        "fake_apn2",
        [Capability::Internet, Capability::Supl, Capability::Fota],
    )
}

fn ims_profile() -> DataProfile {
    DataProfile::new("fake_ims", [Capability::Ims])
}

fn internet_request() -> Vec<NetworkRequest> {
    vec![NetworkRequest::new([Capability::Internet])]
}

fn ims_request() -> Vec<NetworkRequest> {
    vec![NetworkRequest::new([Capability::Ims])]
}

fn harness_from(config: RelinkConfig) -> Harness {
    let clock = Arc::new(FakeClock::new());
    let recorder = Recorder::default();
    let alarms = MockAlarm::default();
    let store = SharedStore(Arc::new(Mutex::new(InMemoryProfileStore::new([
        profile1(),
        profile2(),
        ims_profile(),
    ]))));
    let scheduler = RetryScheduler::new(
        &config,
        clock.clone(),
        Box::new(alarms.clone()),
        Box::new(store.clone()),
        Box::new(recorder.clone()),
    )
    .unwrap();
    Harness {
        scheduler,
        clock,
        recorder,
        alarms,
        store,
    }
}

fn harness_with_rules(setup_rules: &[&str], handover_rules: &[&str]) -> Harness {
    let config = RelinkConfig {
        setup_retry_rules: setup_rules.iter().map(|s| s.to_string()).collect(),
        handover_retry_rules: handover_rules.iter().map(|s| s.to_string()).collect(),
        ..RelinkConfig::default()
    };
    harness_from(config)
}

#[test]
fn network_suggested_retry_overrides_rule_matching() {
    let mut h = harness_with_rules(&["capabilities=internet, retry_interval=9999"], &[]);
    let requests = internet_request();
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::AfterMillis(1000),
    );
    h.process_all_future_messages();

    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    let entry = &fired[0];
    assert_eq!(entry.setup_retry_type, SetupRetryType::DataProfile);
    assert_eq!(entry.data_profile.as_ref().unwrap().apn_name, "fake_apn1");
    assert_eq!(entry.retry_delay_millis, 1000);
    assert_eq!(entry.request_list, requests);
    assert!(entry.applied_rule.is_none());
}

#[test]
fn network_suggested_never_retry_publishes_permanent_throttle() {
    let mut h = harness_with_rules(&["capabilities=ims, retry_interval=2000"], &[]);
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &ims_request(),
        123,
        SuggestedRetry::Never,
    );
    h.process_all_future_messages();

    assert_eq!(
        h.recorder.throttle_events(),
        vec![vec![ThrottleStatus {
            capability: Capability::Ims,
            retry_type: RetryType::None,
            expiry: ThrottleExpiry::Never,
            transport: Transport::Wwan,
        }]]
    );
    assert!(h.recorder.setup_entries().is_empty());
    assert!(h.scheduler.list_retries().is_empty());
}

#[test]
fn unthrottling_cancels_only_the_reported_transport() {
    let mut h = harness_with_rules(&["capabilities=ims, retry_interval=2000"], &[]);
    let requests = ims_request();
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::AfterMillis(456),
    );
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wlan,
        &requests,
        123,
        SuggestedRetry::AfterMillis(456),
    );
    h.scheduler.drain();
    assert_eq!(h.scheduler.list_retries().len(), 2);
    h.store.mark_failed("fake_ims");
    h.recorder.clear();

    // Modem reconstructs the profile under another entry name; identity is
    // the APN.
    let from_modem = DataProfile::new("fake_ims", [Capability::Ims]);
    h.scheduler.on_profile_unthrottled(&from_modem, Transport::Wwan);
    h.scheduler.drain();

    assert!(!h.store.is_failed("fake_ims"));
    assert_eq!(
        h.recorder.throttle_events(),
        vec![vec![ThrottleStatus {
            capability: Capability::Ims,
            retry_type: RetryType::NewConnection,
            expiry: ThrottleExpiry::UnthrottledNow,
            transport: Transport::Wwan,
        }]]
    );

    // The zero-delay revival fired immediately, on WWAN, with the profile.
    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 0);
    assert_eq!(fired[0].transport, Transport::Wwan);
    assert_eq!(fired[0].data_profile.as_ref().unwrap().apn_name, "fake_ims");

    // The WWAN 456 ms retry is cancelled; the WLAN one is untouched.
    assert_eq!(h.scheduler.list_retries().len(), 3);
    for entry in h.scheduler.list_retries() {
        let RetryEntry::Setup(s) = entry else {
            panic!("unexpected handover entry");
        };
        match (s.transport, s.retry_delay_millis) {
            (Transport::Wwan, 0) => assert_eq!(s.state(), RetryState::NotRetried),
            (Transport::Wwan, _) => assert_eq!(s.state(), RetryState::Cancelled),
            (Transport::Wlan, _) => assert_eq!(s.state(), RetryState::NotRetried),
        }
    }
}

#[test]
fn unthrottle_after_never_retry_revives_the_stored_request() {
    let mut h = harness_with_rules(&["capabilities=enterprise, retry_interval=2000"], &[]);
    let profile = DataProfile::new("enterprise_slice", [Capability::Enterprise]);
    let requests = vec![NetworkRequest::new([Capability::Enterprise])];
    h.scheduler.evaluate_setup_retry(
        &profile,
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Never,
    );
    h.scheduler.drain();
    h.recorder.clear();

    h.scheduler.on_profile_unthrottled(&profile, Transport::Wwan);
    h.scheduler.drain();

    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 0);
    assert_eq!(fired[0].transport, Transport::Wwan);
    assert_eq!(
        fired[0].data_profile.as_ref().unwrap().apn_name,
        "enterprise_slice"
    );
    assert_eq!(fired[0].request_list, requests);
}

#[test]
fn unthrottle_for_unknown_profile_is_a_no_op() {
    let mut h = harness_with_rules(&["capabilities=internet, retry_interval=2000"], &[]);
    h.scheduler
        .on_profile_unthrottled(&DataProfile::new("nobody", [Capability::Internet]), Transport::Wwan);
    h.scheduler.drain();
    assert!(h.recorder.throttle_events().is_empty());
    assert!(h.recorder.setup_entries().is_empty());
}

#[test]
fn stale_and_unknown_firings_are_dropped() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=2000, maximum_retries=2"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();
    let id = h.scheduler.list_retries()[0].id();

    // Cancelled before the timer fires: the firing must be swallowed.
    h.scheduler.report_retry_result(id, RetryState::Cancelled);
    h.process_all_future_messages();
    assert!(h.recorder.setup_entries().is_empty());

    // Unknown ids are ignored outright.
    h.scheduler.fire_entry(9999);
    assert!(h.recorder.setup_entries().is_empty());

    // A fresh retry fires exactly once.
    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    assert_eq!(h.recorder.setup_entries().len(), 1);
}

#[test]
fn cancelling_handover_retry_unthrottles_the_target_transport() {
    let mut h = harness_with_rules(&[], &["retry_interval=1000|2000, maximum_retries=10"]);
    let network = DataNetworkInfo {
        id: 7,
        data_profile: ims_profile(),
        transport: Transport::Wwan,
        request_list: ims_request(),
    };
    h.scheduler
        .evaluate_handover_retry(&network, 123, SuggestedRetry::AfterMillis(1000));
    h.scheduler.drain();
    assert!(h.scheduler.is_any_handover_retry_scheduled(7));
    h.recorder.clear();

    h.scheduler.cancel_pending_handover_retry(7);
    h.scheduler.drain();

    assert!(!h.scheduler.is_any_handover_retry_scheduled(7));
    assert_eq!(
        h.recorder.throttle_events(),
        vec![vec![ThrottleStatus {
            capability: Capability::Ims,
            retry_type: RetryType::Handover,
            expiry: ThrottleExpiry::UnthrottledNow,
            transport: Transport::Wlan,
        }]]
    );
    assert_eq!(
        h.scheduler.list_retries().last().unwrap().state(),
        RetryState::Cancelled
    );

    // The swallowed timer firing must not reach the callback.
    h.process_all_future_messages();
    assert!(h.recorder.handover_entries().is_empty());
}

#[test]
fn handover_retry_backs_off_per_network() {
    let mut h = harness_with_rules(
        &[],
        &["retry_interval=1000|2000|4000|8000|16000, maximum_retries=5"],
    );
    let network = DataNetworkInfo {
        id: 42,
        data_profile: ims_profile(),
        transport: Transport::Wwan,
        request_list: ims_request(),
    };

    for expected in [1000u64, 2000, 4000] {
        h.recorder.clear();
        h.scheduler
            .evaluate_handover_retry(&network, 5, SuggestedRetry::Undefined);
        h.process_all_future_messages();
        let fired = h.recorder.handover_entries();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].retry_delay_millis, expected);
        assert_eq!(fired[0].network.id, 42);
        assert!(fired[0].applied_rule.is_some());
        h.scheduler.report_retry_result(fired[0].id, RetryState::Failed);
    }

    // Another network starts from the beginning of the schedule.
    let other = DataNetworkInfo { id: 43, ..network };
    h.recorder.clear();
    h.scheduler
        .evaluate_handover_retry(&other, 5, SuggestedRetry::Undefined);
    h.process_all_future_messages();
    assert_eq!(h.recorder.handover_entries()[0].retry_delay_millis, 1000);
}

#[test]
fn handover_without_rules_retries_once_after_the_default_interval() {
    let mut h = harness_with_rules(&[], &[]);
    let network = DataNetworkInfo {
        id: 9,
        data_profile: ims_profile(),
        transport: Transport::Wlan,
        request_list: ims_request(),
    };
    h.scheduler
        .evaluate_handover_retry(&network, 5, SuggestedRetry::Undefined);
    h.process_all_future_messages();

    let fired = h.recorder.handover_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 5000);
    assert!(fired[0].applied_rule.is_none());
}

#[test]
fn permanent_fail_cause_marks_profile_and_still_retries_via_other_profiles() {
    let mut h = harness_with_rules(
        &["permanent_fail_causes=8|27|2253|2254, retry_interval=2500"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        2253,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();

    assert!(h.store.is_failed("fake_apn1"));
    // fake_apn2 can still carry internet, so the request is retried.
    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 2500);
    assert_eq!(fired[0].setup_retry_type, SetupRetryType::NetworkRequests);
    assert!(fired[0].data_profile.is_none());

    // A connected network using the profile clears the flag.
    h.scheduler
        .on_data_network_connected(Transport::Wwan, &profile1());
    assert!(!h.store.is_failed("fake_apn1"));
}

#[test]
fn permanent_fail_cause_with_no_alternative_profile_stops_retrying() {
    let mut h = harness_with_rules(
        &["permanent_fail_causes=8|27|2253|2254, retry_interval=2500"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &ims_request(),
        2253,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();

    assert!(h.store.is_failed("fake_ims"));
    assert!(h.recorder.setup_entries().is_empty());
}

#[test]
fn maximum_retries_are_enforced_per_transport() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=2000, maximum_retries=2"],
        &[],
    );
    let requests = internet_request();
    let expected_rule = "capabilities=internet, retry_interval=2000, maximum_retries=2"
        .parse()
        .unwrap();

    // Failures on different profiles share the (capability, rule, transport)
    // counter.
    for profile in [profile1(), profile2()] {
        h.recorder.clear();
        h.scheduler.evaluate_setup_retry(
            &profile,
            Transport::Wwan,
            &requests,
            123,
            SuggestedRetry::Undefined,
        );
        h.process_all_future_messages();
        let fired = h.recorder.setup_entries();
        assert_eq!(fired.len(), 1);
        let entry = &fired[0];
        assert_eq!(entry.setup_retry_type, SetupRetryType::NetworkRequests);
        assert!(entry.data_profile.is_none());
        assert_eq!(entry.retry_delay_millis, 2000);
        assert_eq!(entry.request_list, requests);
        assert_eq!(entry.applied_rule.as_ref(), Some(&expected_rule));
        h.scheduler.report_retry_result(entry.id, RetryState::Failed);
    }

    // Third failure: retries exhausted on WWAN.
    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    assert!(h.recorder.setup_entries().is_empty());

    // Counters are per transport: WLAN still retries.
    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wlan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    assert_eq!(h.recorder.setup_entries().len(), 1);
}

#[test]
fn successful_retry_resets_the_rule_counter() {
    let mut h = harness_with_rules(
        &[
            "capabilities=eims, retry_interval=1000, maximum_retries=20",
            "capabilities=ims|mms|fota, retry_interval=3000, maximum_retries=1",
        ],
        &[],
    );
    let requests = ims_request();

    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 3000);

    // Success clears the retry count; the next failure is retried again even
    // though maximum_retries is 1.
    h.scheduler
        .report_retry_result(fired[0].id, RetryState::Succeeded);
    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 3000);
}

#[test]
fn backoff_schedule_repeats_last_interval_then_stops() {
    let mut h = harness_with_rules(
        &[
            "capabilities=eims, retry_interval=1000, maximum_retries=20",
            "capabilities=internet|mms|fota, retry_interval=3000, maximum_retries=1",
            "capabilities=ims, retry_interval=2000|4000|8000, maximum_retries=4",
        ],
        &[],
    );
    let requests = ims_request();
    let expected_rule = "capabilities=ims, retry_interval=2000|4000|8000, maximum_retries=4"
        .parse()
        .unwrap();

    for expected_delay in [2000u64, 4000, 8000, 8000] {
        h.recorder.clear();
        h.scheduler.evaluate_setup_retry(
            &ims_profile(),
            Transport::Wwan,
            &requests,
            123,
            SuggestedRetry::Undefined,
        );
        h.process_all_future_messages();
        let fired = h.recorder.setup_entries();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].retry_delay_millis, expected_delay);
        assert_eq!(fired[0].applied_rule.as_ref(), Some(&expected_rule));
        h.scheduler
            .report_retry_result(fired[0].id, RetryState::Failed);
    }

    // The fifth failure produces no retry.
    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    assert!(h.recorder.setup_entries().is_empty());
}

#[test]
fn long_delays_are_armed_on_the_wake_alarm() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=120000, maximum_retries=2"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();

    // Nothing on the in-process queue; the wake alarm owns the delay.
    assert!(h.scheduler.next_timer_due().is_none());
    let scheduled = h.alarms.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].0, 120000);

    // Delivering the alarm firing starts the retry attempt.
    h.scheduler.fire_entry(scheduled[0].1);
    assert_eq!(h.recorder.setup_entries().len(), 1);
}

#[test]
fn prefer_wake_alarms_routes_short_delays_to_the_alarm() {
    let config = RelinkConfig {
        setup_retry_rules: vec!["capabilities=internet, retry_interval=2000".to_string()],
        handover_retry_rules: vec![],
        prefer_wake_alarms: true,
        ..RelinkConfig::default()
    };
    let mut h = harness_from(config);
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();

    assert!(h.scheduler.next_timer_due().is_none());
    assert_eq!(h.alarms.scheduled().len(), 1);
    assert_eq!(h.alarms.scheduled()[0].0, 2000);
}

#[test]
fn similar_request_detection_matches_primary_capability_and_transport() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=2000, maximum_retries=2"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();

    // Modifier capabilities on the queried request are ignored.
    let query = NetworkRequest::new([Capability::Internet, Capability::PrioritizeLatency]);
    assert!(h
        .scheduler
        .is_similar_request_retry_scheduled(&query, Transport::Wwan));
    assert!(!h
        .scheduler
        .is_similar_request_retry_scheduled(&query, Transport::Wlan));

    let other = NetworkRequest::new([Capability::Mms]);
    assert!(!h
        .scheduler
        .is_similar_request_retry_scheduled(&other, Transport::Wwan));
}

#[test]
fn modifier_capability_requests_match_their_own_rules() {
    let mut h = harness_with_rules(
        &["capabilities=prioritize_bandwidth, retry_interval=200, maximum_retries=2"],
        &[],
    );
    let requests = vec![NetworkRequest::new([Capability::PrioritizeBandwidth])];
    h.scheduler.evaluate_setup_retry(
        &DataProfile::new("slice", [Capability::PrioritizeBandwidth]),
        Transport::Wwan,
        &requests,
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();

    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 200);

    let query = NetworkRequest::new([
        Capability::PrioritizeBandwidth,
        Capability::PrioritizeLatency,
    ]);
    assert!(h
        .scheduler
        .is_similar_request_retry_scheduled(&query, Transport::Wwan));
    assert!(!h
        .scheduler
        .is_similar_request_retry_scheduled(&query, Transport::Wlan));
}

fn assert_full_reset(h: &mut Harness, reset: impl FnOnce(&mut RetryScheduler)) {
    // One permanently throttled capability and one pending rule-based retry.
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &ims_request(),
        123,
        SuggestedRetry::Never,
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();
    h.store.mark_failed("fake_ims");
    h.recorder.clear();

    reset(&mut h.scheduler);
    h.scheduler.drain();

    let events = h.recorder.throttle_events();
    assert_eq!(events.len(), 1);
    let statuses = &events[0];
    assert_eq!(statuses.len(), 2);
    for capability in [Capability::Ims, Capability::Internet] {
        assert!(statuses.contains(&ThrottleStatus {
            capability,
            retry_type: RetryType::NewConnection,
            expiry: ThrottleExpiry::UnthrottledNow,
            transport: Transport::Wwan,
        }));
    }
    assert!(!h.store.is_failed("fake_ims"));
    assert!(h
        .scheduler
        .list_retries()
        .iter()
        .all(|e| e.state().is_terminal()));
}

#[test]
fn radio_on_resets_all_throttling() {
    let mut h = harness_with_rules(
        &[
            "capabilities=ims, retry_interval=3000",
            "capabilities=internet, retry_interval=2000, maximum_retries=2",
        ],
        &[],
    );
    assert_full_reset(&mut h, |s| s.on_radio_on());
}

#[test]
fn modem_reset_resets_all_throttling() {
    let mut h = harness_with_rules(
        &[
            "capabilities=ims, retry_interval=3000",
            "capabilities=internet, retry_interval=2000, maximum_retries=2",
        ],
        &[],
    );
    assert_full_reset(&mut h, |s| s.on_modem_reset());
}

#[test]
fn tac_change_resets_only_when_configured() {
    let mut h = harness_with_rules(&["capabilities=ims, retry_interval=3000"], &[]);
    h.scheduler.evaluate_setup_retry(
        &ims_profile(),
        Transport::Wwan,
        &ims_request(),
        123,
        SuggestedRetry::Never,
    );
    h.scheduler.drain();
    h.recorder.clear();

    // Disabled by default: nothing happens.
    h.scheduler.on_tracking_area_changed();
    h.scheduler.drain();
    assert!(h.recorder.throttle_events().is_empty());

    // Enabled: behaves like the other resets.
    let config = RelinkConfig {
        setup_retry_rules: vec![
            "capabilities=ims, retry_interval=3000".to_string(),
            "capabilities=internet, retry_interval=2000, maximum_retries=2".to_string(),
        ],
        handover_retry_rules: vec![],
        reset_throttling_on_tac_change: true,
        ..RelinkConfig::default()
    };
    let mut h = harness_from(config);
    assert_full_reset(&mut h, |s| s.on_tracking_area_changed());
}

#[test]
fn invalid_rule_update_keeps_the_previous_rules() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=2000, maximum_retries=2"],
        &[],
    );
    let bad = RelinkConfig {
        // No match condition: invalid for a setup rule.
        setup_retry_rules: vec!["retry_interval=1000".to_string()],
        ..RelinkConfig::default()
    };
    assert!(h.scheduler.update_config(&bad).is_err());

    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();

    let fired = h.recorder.setup_entries();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].retry_delay_millis, 2000);
}

#[test]
fn config_update_installs_new_rules_and_drops_derived_state() {
    let mut h = harness_with_rules(
        &["capabilities=internet, retry_interval=2000, maximum_retries=2"],
        &[],
    );
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.scheduler.drain();
    assert_eq!(h.scheduler.list_retries()[0].state(), RetryState::NotRetried);

    let newer = RelinkConfig {
        setup_retry_rules: vec!["capabilities=internet, retry_interval=7000".to_string()],
        handover_retry_rules: vec![],
        ..RelinkConfig::default()
    };
    h.scheduler.update_config(&newer).unwrap();
    assert_eq!(h.scheduler.list_retries()[0].state(), RetryState::Cancelled);

    h.recorder.clear();
    h.scheduler.evaluate_setup_retry(
        &profile1(),
        Transport::Wwan,
        &internet_request(),
        123,
        SuggestedRetry::Undefined,
    );
    h.process_all_future_messages();
    assert_eq!(h.recorder.setup_entries()[0].retry_delay_millis, 7000);
}

#[test]
fn rejects_invalid_rules_at_construction() {
    let config = RelinkConfig {
        setup_retry_rules: vec!["retry_interval=1000".to_string()],
        ..RelinkConfig::default()
    };
    let result = RetryScheduler::new(
        &config,
        Arc::new(FakeClock::new()),
        Box::new(MockAlarm::default()),
        Box::new(InMemoryProfileStore::default()),
        Box::new(Recorder::default()),
    );
    assert!(result.is_err());
}
