//! # PayVault Security
//!
//! Field-level encryption of card data, the key store port, and PAN masking
//! for display.

pub mod crypto;
pub mod masking;

pub use crypto::*;
pub use masking::{last_four, mask_pan};
