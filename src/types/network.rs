//! Snapshot of a live data network handed in for handover evaluation.

use super::{DataProfile, RequestList, Transport};

/// What the engine needs to know about a data network when a handover attempt
/// fails: identity, the profile it runs on, its current transport, and the
/// requests attached to it. The network object itself lives in the
/// orchestrator; the engine only keeps this snapshot.
#[derive(Debug, Clone)]
pub struct DataNetworkInfo {
    pub id: u64,
    pub data_profile: DataProfile,
    pub transport: Transport,
    pub request_list: RequestList,
}
