//! Memory module - Core types and data structures
//!
//! Defines the data model shared by every component:
//! - [`MemoryItem`] with content fingerprinting and access tracking
//! - [`MemoryContext`] situational metadata for items and queries
//! - [`MemoryQuery`] with hard filters and a similarity threshold

mod item;
mod query;

pub use item::{
    content_fingerprint, AccessLevel, MemoryContext, MemoryItem, MemoryType,
};
pub use query::{MemoryQuery, QueryFilters, TimeRange};
