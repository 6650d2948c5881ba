//! Impls - port implementations.
//!
//! - **memory**: in-memory document store (active store, history, status)
//! - **InMemoryAttachments**: attachment source for tests and demos
//!
//! A durable backend would live in its own crate next to this one and
//! implement the same ports.

pub mod inmem_attachments;
pub mod memory;

pub use self::inmem_attachments::InMemoryAttachments;
pub use self::memory::InMemoryDocumentStore;
