//! Fan-out of one logical counter to multiple sink registries.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use rustc_hash::FxHasher;

use crate::counter::{Counter, CounterCore, NoopCounter};
use crate::key::MetricKey;
use crate::registry::{CounterSource, Registry};

/// Fans a single logical counter's updates out to one counter per
/// child registry, typically one per configured monitoring backend.
///
/// The per-child counters are resolved once, when the composite
/// counter is built, into a fixed slice. `increment` walks that slice;
/// it never re-derives the fan-out list from the live child set, so
/// the hot path performs no allocation however many children are
/// configured.
///
/// With a single child the composite hands back the child registry's
/// counter directly; there is no wrapper to pay for.
pub struct CompositeRegistry {
    children: Box<[Registry]>,
    counters: DashMap<MetricKey, Counter, BuildHasherDefault<FxHasher>>,
}

impl CompositeRegistry {
    /// Build a composite over `children`. Fan-out order is the
    /// iteration order given here and never changes afterwards.
    pub fn new(children: impl IntoIterator<Item = Registry>) -> Self {
        CompositeRegistry {
            children: children.into_iter().collect(),
            counters: DashMap::default(),
        }
    }

    /// Resolve the fan-out counter for `key`.
    ///
    /// Resolution is idempotent like [`Registry::counter`]: repeated
    /// calls with an equal key return the same handle. Every child
    /// registry resolves its own canonical counter for the key, so
    /// reading `child.counter(key).value()` on any child observes the
    /// updates made through the composite handle.
    pub fn counter(&self, key: MetricKey) -> Counter {
        match self.children.len() {
            0 => Counter::new(Arc::new(NoopCounter::new(key))),
            1 => self.children[0].counter(key),
            _ => {
                if let Some(existing) = self.counters.get(&key) {
                    return existing.value().clone();
                }
                match self.counters.entry(key) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        let resolved = self
                            .children
                            .iter()
                            .map(|child| child.counter(entry.key().clone()))
                            .collect();
                        let counter = Counter::new(Arc::new(FanoutCounter {
                            key: entry.key().clone(),
                            children: resolved,
                        }));
                        entry.insert(counter.clone());
                        counter
                    }
                }
            }
        }
    }

    /// The number of child registries.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the composite has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl CounterSource for CompositeRegistry {
    fn counter(&self, key: MetricKey) -> Counter {
        CompositeRegistry::counter(self, key)
    }
}

impl fmt::Debug for CompositeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRegistry")
            .field("children", &self.children.len())
            .finish()
    }
}

/// Forwards every update to a fixed, construction-time-resolved list
/// of child counters. Only built for two or more children.
struct FanoutCounter {
    key: MetricKey,
    children: Box<[Counter]>,
}

impl CounterCore for FanoutCounter {
    fn key(&self) -> &MetricKey {
        &self.key
    }

    fn add(&self, value: u64) {
        for child in self.children.iter() {
            child.add(value);
        }
    }

    fn value(&self) -> u64 {
        // Children receive identical updates, so the first child's
        // accumulator is the composite's value.
        self.children[0].value()
    }
}
