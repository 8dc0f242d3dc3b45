//! relink: retry and throttling engine for cellular data connections.
//!
//! After a data-network setup or handover attempt fails, the scheduler decides
//! whether, when, and how to retry, and publishes throttle status per
//! (capability, transport) pair so the connection orchestrator can suppress
//! duplicate attempts. Retry behavior is driven by operator-configured rule
//! strings; see [`rule`] for the format.
//!
//! The engine is a single-threaded state machine with an explicit event
//! queue. Embed it directly via [`scheduler::RetryScheduler`], or run it as a
//! tokio task through [`service::RetryService`].

pub mod callback;
pub mod clock;
pub mod config;
pub mod entry;
pub mod logging;
pub mod rule;
pub mod scheduler;
pub mod service;
pub mod throttle;
pub mod types;
