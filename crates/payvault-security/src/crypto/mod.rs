//! Field-level encryption.

mod guard;
mod key_store;

pub use guard::*;
pub use key_store::*;
