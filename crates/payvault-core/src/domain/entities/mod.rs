//! Domain entities.

mod cache_entry;
mod history;
mod payment;

pub use cache_entry::CacheEntry;
pub use history::PaymentHistoryPage;
pub use payment::Payment;
