//! Query matcher: resolves a signature to its matching entities.
//!
//! Results are cached per signature match key together with the storage
//! generations of the types involved. A cached answer is reused only while
//! none of those columns changed, so the observable result always equals a
//! full rescan of the world.

use std::collections::HashMap;

use engine_component::{Entity, Signature};

use crate::world::World;

#[derive(Debug)]
struct CachedMatch {
    generations: Vec<u64>,
    entities: Vec<Entity>,
}

/// Incremental signature matcher.
#[derive(Debug, Default)]
pub struct QueryMatcher {
    cache: HashMap<Vec<String>, CachedMatch>,
    hits: u64,
    misses: u64,
}

impl QueryMatcher {
    /// Create a matcher with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities currently carrying every type of `signature`, in creation
    /// order.
    pub fn matching(&mut self, world: &World, signature: &Signature) -> Vec<Entity> {
        let key = signature.match_key();
        let generations: Vec<u64> = key
            .iter()
            .map(|ty| world.storage().generation(ty))
            .collect();

        if let Some(cached) = self.cache.get(&key) {
            if cached.generations == generations {
                self.hits += 1;
                return cached.entities.clone();
            }
        }

        self.misses += 1;
        let entities = world.storage().intersect(&key);
        self.cache.insert(
            key,
            CachedMatch {
                generations,
                entities: entities.clone(),
            },
        );
        entities
    }

    /// Drop cached results for signatures no longer in `live`.
    pub fn retain_signatures<'a>(&mut self, live: impl IntoIterator<Item = &'a Signature>) {
        let keys: Vec<Vec<String>> = live.into_iter().map(Signature::match_key).collect();
        self.cache.retain(|key, _| keys.contains(key));
    }

    /// Number of cached signatures.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// `(hits, misses)` since creation.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
