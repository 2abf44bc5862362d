//! Fetch-engine client code for sitegrab.
//!
//! This crate provides the per-site retry/redirect/TLS state machine, the
//! attempt failure taxonomy, and the certificate-capturing TLS plumbing the
//! grab binary drives its worker pool with.

pub mod fetch;
pub mod tls;

pub use fetch::SiteFetcher;
pub use fetch::classify::{AttemptFailure, classify};
pub use fetch::machine::{AttemptPlan, SiteMachine, Step, Verdict};
pub use tls::{CapturedChain, TlsConfigs, TlsError, TlsMode};
