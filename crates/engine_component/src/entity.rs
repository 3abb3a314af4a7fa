//! Entity identifiers.
//!
//! An [`Entity`] is an opaque `u64` with no data of its own; whatever it
//! means comes from the components attached to it. Ids come from the
//! [`EntityAllocator`] owned by one engine and are never handed out twice,
//! so an id that outlived its entity is always detected as unknown.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Ordering is allocation order. Systems visit their entities in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Wrap a raw id, e.g. one read back from an event payload.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Hands out entity ids in increasing order, starting at 1.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Reserve a fresh id. Ids of destroyed entities are not recycled.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        entity
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
