//! Network requests: capability sets with a primary-capability view.

use std::collections::BTreeSet;

use super::Capability;

/// A requested set of network properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    capabilities: BTreeSet<Capability>,
}

/// Ordered list of requests a retry entry was created for.
pub type RequestList = Vec<NetworkRequest>;

impl NetworkRequest {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// The capability retry rules match against: the highest-priority APN-type
    /// capability, or the highest-priority modifier when no APN type is present.
    pub fn primary_capability(&self) -> Option<Capability> {
        self.capabilities
            .iter()
            .copied()
            .filter(|c| c.is_apn_type())
            .max_by_key(|c| c.priority())
            .or_else(|| self.capabilities.iter().copied().max_by_key(|c| c.priority()))
    }
}
