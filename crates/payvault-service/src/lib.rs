//! # PayVault Service
//!
//! Payment orchestration for PayVault: validation, field encryption,
//! deduplicated submission with bounded retry, and a time-bounded local
//! cache of payment records.

pub mod cache;
pub mod orchestrator;
pub mod payment_service;

pub use cache::*;
pub use orchestrator::*;
pub use payment_service::*;
