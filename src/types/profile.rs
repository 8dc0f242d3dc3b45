//! Data profiles (APN-equivalent) and the permanent-failure store.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{Capability, NetworkRequest};

/// A named data-connection configuration with capability implications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataProfile {
    pub apn_name: String,
    pub capabilities: BTreeSet<Capability>,
}

impl DataProfile {
    pub fn new(
        apn_name: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            apn_name: apn_name.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Profile identity for throttling purposes is the APN name: a profile
    /// reconstructed by the modem under a different entry name still matches.
    pub fn is_same_apn(&self, other: &DataProfile) -> bool {
        self.apn_name == other.apn_name
    }

    /// Highest-priority capability this profile can provide.
    pub fn primary_capability(&self) -> Option<Capability> {
        self.capabilities.iter().copied().max_by_key(|c| c.priority())
    }

    pub fn can_satisfy(&self, request: &NetworkRequest) -> bool {
        request
            .primary_capability()
            .map_or(false, |c| self.capabilities.contains(&c))
    }
}

/// Per-profile permanent-failure bookkeeping, owned outside the engine.
///
/// The scheduler marks a profile permanently failed when a
/// `permanent_fail_causes` rule matches, clears the flag on unthrottle or a
/// successful connection, and asks whether another profile could satisfy a
/// request before giving up on it entirely.
pub trait ProfileStore: Send {
    fn mark_permanently_failed(&mut self, apn_name: &str, failed: bool);
    fn is_permanently_failed(&self, apn_name: &str) -> bool;
    fn clear_all_permanent_failures(&mut self);
    /// Whether an installed profile other than `apn_name` can satisfy `request`.
    fn has_alternative_profile(&self, request: &NetworkRequest, apn_name: &str) -> bool;
}

/// In-memory [`ProfileStore`] over a fixed set of installed profiles.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: HashMap<String, DataProfile>,
    permanently_failed: HashSet<String>,
}

impl InMemoryProfileStore {
    pub fn new(profiles: impl IntoIterator<Item = DataProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.apn_name.clone(), p))
                .collect(),
            permanently_failed: HashSet::new(),
        }
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn mark_permanently_failed(&mut self, apn_name: &str, failed: bool) {
        if failed {
            self.permanently_failed.insert(apn_name.to_string());
        } else {
            self.permanently_failed.remove(apn_name);
        }
    }

    fn is_permanently_failed(&self, apn_name: &str) -> bool {
        self.permanently_failed.contains(apn_name)
    }

    fn clear_all_permanent_failures(&mut self) {
        self.permanently_failed.clear();
    }

    fn has_alternative_profile(&self, request: &NetworkRequest, apn_name: &str) -> bool {
        self.profiles
            .values()
            .any(|p| p.apn_name != apn_name && p.can_satisfy(request))
    }
}
