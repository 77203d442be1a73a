//! # PayVault Resilience
//!
//! Bounded exponential-backoff retry, deadlines, and the idempotent
//! submission coordinator that sits between the orchestrator and the gateway.

pub mod coordinator;
pub mod retry;
pub mod timeout;

pub use coordinator::*;
pub use retry::*;
pub use timeout::*;
