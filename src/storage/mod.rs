//! In-memory storage primitives.
//!
//! Bounded copy-on-write buffers, the global trace store and the back-link
//! index shared by traces and logs.

pub mod backlinks;
pub mod buffer;
pub mod traces;

// Re-export commonly used types
pub use backlinks::{BackLink, BacklinkIndex};
pub use buffer::{Snapshot, SnapshotBuffer};
pub use traces::{TraceEntry, TraceStorage, TraceWrite};
