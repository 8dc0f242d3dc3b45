//! Domain vocabulary shared across the engine.

mod capability;
mod network;
mod profile;
mod request;
mod transport;

pub use capability::Capability;
pub use network::DataNetworkInfo;
pub use profile::{DataProfile, InMemoryProfileStore, ProfileStore};
pub use request::{NetworkRequest, RequestList};
pub use transport::Transport;

/// Retry hint attached to a setup/handover failure by the network.
///
/// A concrete duration overrides rule matching entirely; `Never` publishes a
/// permanent throttle instead of scheduling anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedRetry {
    /// The network supplied no retry duration; rule matching applies.
    Undefined,
    /// Retry after the given delay, bypassing rule matching.
    AfterMillis(u64),
    /// Never retry this profile automatically.
    Never,
}
