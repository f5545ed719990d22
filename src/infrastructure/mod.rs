//! Adapters for the domain ports.

pub mod in_memory;
pub mod jwt;
#[cfg(feature = "storage-mongodb")]
pub mod mongo;
pub mod stripe;
