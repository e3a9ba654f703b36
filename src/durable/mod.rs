//! Durable Tier
//!
//! The persistent backing tier. [`store::DurableStore`] is the external
//! collaborator contract (a namespaced async byte-store that may fail
//! transiently); [`tier::DurableTier`] is the accessor that layers key
//! namespacing and the serialized entry record on top of it.

mod store;
mod tier;

pub use store::{DurableStore, InMemoryDurableStore};
pub use tier::DurableTier;
