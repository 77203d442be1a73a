//! # Payment Domain
//!
//! Entities, value objects and submission payloads for PayVault.

pub mod entities;
pub mod requests;
pub mod value_objects;

pub use entities::*;
pub use requests::*;
pub use value_objects::*;
