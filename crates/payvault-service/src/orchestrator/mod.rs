//! Payment service implementations.
//!
//! This module contains the concrete implementation of [`PaymentService`](crate::PaymentService).
//! The trait definition lives in `payment_service.rs`.

pub mod payment_orchestrator;

pub use payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};
