//! Persistence reader implementations
//!
//! The role resolver only needs four read-only ownership queries; the trait
//! lives in `access_control::resolver` next to its consumer. This module
//! provides the in-memory implementation used by the demo binary and tests.

mod memory;

pub use memory::MemoryStore;
