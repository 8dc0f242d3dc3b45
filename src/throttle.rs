//! Throttle status derivation and publication state.
//!
//! The tracker keeps the latest throttle record per (capability, transport)
//! pair. Records retain the throttled profile and request list so a later
//! unthrottle can revive the request with a zero-delay retry even when no
//! retry entry exists (network-suggested "never retry" followed by a modem
//! unthrottle).

use crate::types::{Capability, DataProfile, RequestList, Transport};

/// Kind of retry a throttle expiry would allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryType {
    None,
    NewConnection,
    Handover,
}

/// When a throttled (capability, transport) pair may be retried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleExpiry {
    /// No throttle in effect; attempts may be issued immediately.
    UnthrottledNow,
    /// Throttled until the given absolute time (engine-clock milliseconds).
    Until(u64),
    /// Never retry automatically.
    Never,
}

/// Published statement that attempts for a capability on a transport should
/// not occur until the expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleStatus {
    pub capability: Capability,
    pub retry_type: RetryType,
    pub expiry: ThrottleExpiry,
    pub transport: Transport,
}

/// Internal record behind a published status.
#[derive(Debug, Clone)]
pub(crate) struct ThrottleRecord {
    pub capability: Capability,
    pub transport: Transport,
    pub retry_type: RetryType,
    pub expiry: ThrottleExpiry,
    pub data_profile: Option<DataProfile>,
    pub request_list: RequestList,
}

impl ThrottleRecord {
    pub fn status(&self) -> ThrottleStatus {
        ThrottleStatus {
            capability: self.capability,
            retry_type: self.retry_type,
            expiry: self.expiry,
            transport: self.transport,
        }
    }
}

/// Latest throttle record per (capability, transport) pair.
#[derive(Debug, Default)]
pub(crate) struct ThrottleTracker {
    records: Vec<ThrottleRecord>,
}

impl ThrottleTracker {
    /// Install `record`, replacing any previous one for the same pair, and
    /// return the status to publish.
    pub fn upsert(&mut self, record: ThrottleRecord) -> ThrottleStatus {
        self.records
            .retain(|r| !(r.capability == record.capability && r.transport == record.transport));
        let status = record.status();
        self.records.push(record);
        status
    }

    /// Remove records for `profile` (APN-name identity), optionally filtered
    /// to one transport.
    pub fn take_for_profile(
        &mut self,
        profile: &DataProfile,
        transport: Option<Transport>,
    ) -> Vec<ThrottleRecord> {
        let (matching, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.records).into_iter().partition(|r| {
                r.data_profile
                    .as_ref()
                    .map_or(false, |p| p.is_same_apn(profile))
                    && transport.map_or(true, |t| r.transport == t)
            });
        self.records = rest;
        matching
    }

    /// Remove the record for one (capability, transport) pair.
    pub fn remove(&mut self, capability: Capability, transport: Transport) -> Option<ThrottleRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.capability == capability && r.transport == transport)?;
        Some(self.records.remove(idx))
    }

    /// Remove and return every record (reset path).
    pub fn drain_all(&mut self) -> Vec<ThrottleRecord> {
        std::mem::take(&mut self.records)
    }
}
