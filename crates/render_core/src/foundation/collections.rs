//! Specialized collection types

pub use slotmap::{new_key_type, Key, SlotMap};

/// Handle-based map using slot map for stable references.
///
/// Keys stay valid across unrelated inserts and removals, and a removed
/// key is never handed out again for a different value.
pub type HandleMap<K, V> = SlotMap<K, V>;
