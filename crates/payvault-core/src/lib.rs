//! # PayVault Core
//!
//! Payment data model, error taxonomy, card validation and the ports to the
//! remote gateway and persistent cache storage. Every other PayVault crate
//! builds on these types.

pub mod clock;
pub mod domain;
pub mod error;
pub mod id;
pub mod pagination;
pub mod ports;
pub mod result;
pub mod telemetry;
pub mod validation;

pub use clock::*;
pub use domain::*;
pub use error::*;
pub use id::*;
pub use pagination::*;
pub use ports::*;
pub use result::*;
pub use telemetry::*;
pub use validation::{luhn_check_digit, luhn_valid, ValidationRules, Validator};
