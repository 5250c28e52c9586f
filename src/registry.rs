//! The canonical key-to-counter registry.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use rustc_hash::FxHasher;

use crate::counter::{AtomicCounter, Counter, CounterCore};
use crate::export::Series;
use crate::key::MetricKey;

type SeriesListener = Box<dyn Fn(&MetricKey) + Send + Sync>;

/// Anything that can resolve a [`MetricKey`] to a [`Counter`] handle.
///
/// Implemented by [`Registry`] and
/// [`CompositeRegistry`](crate::CompositeRegistry) so caches can be
/// built over either.
pub trait CounterSource {
    /// Resolve the counter for `key`, creating it on first sight.
    fn counter(&self, key: MetricKey) -> Counter;
}

struct RegistryInner {
    series: DashMap<MetricKey, Arc<AtomicCounter>, BuildHasherDefault<FxHasher>>,
    listener: Option<SeriesListener>,
}

/// Owns the canonical set of counters, at most one per distinct
/// [`MetricKey`].
///
/// Resolution is idempotent: repeated [`counter`](Registry::counter)
/// calls with an equal key return handles to the identical
/// accumulator. Existing keys are resolved without taking an exclusive
/// lock; first-sight keys lock only the owning shard of the backing
/// map, so unrelated keys do not serialize against each other.
///
/// `Registry` is `Clone`; clones share the same underlying state.
///
/// # Example
///
/// ```
/// use tally::{MetricKey, Registry, Tag};
///
/// let registry = Registry::new();
/// let key = MetricKey::new("requests", [Tag::new("state", "sent")])?;
///
/// // Resolve once, at construction time.
/// let counter = registry.counter(key);
///
/// // Hot path: only this.
/// counter.increment();
/// # Ok::<(), tally::MetricError>(())
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::builder().build()
    }

    /// Configuration builder for a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { listener: None }
    }

    /// Returns the canonical counter for `key`, creating it if absent.
    ///
    /// If two threads race to create the counter for the same unseen
    /// key, exactly one accumulator is installed; the loser discards
    /// its candidate and returns a handle to the winner's.
    pub fn counter(&self, key: MetricKey) -> Counter {
        // Fast path, no shard write lock for keys already installed.
        if let Some(existing) = self.inner.series.get(&key) {
            return Counter::new(existing.value().clone());
        }

        match self.inner.series.entry(key) {
            Entry::Occupied(entry) => Counter::new(entry.get().clone()),
            Entry::Vacant(entry) => {
                let core = Arc::new(AtomicCounter::new(entry.key().clone()));
                tracing::debug!(target: "tally", series = %entry.key(), "created new series");
                if let Some(listener) = &self.inner.listener {
                    listener(entry.key());
                }
                entry.insert(core.clone());
                Counter::new(core)
            }
        }
    }

    /// The number of distinct series currently registered.
    pub fn len(&self) -> usize {
        self.inner.series.len()
    }

    /// Whether no series has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.inner.series.is_empty()
    }

    /// Snapshot every registered series as `{key, value}` pairs for an
    /// export layer. Values are relaxed reads; increments racing with
    /// the snapshot land in this cycle or the next.
    pub fn snapshot(&self) -> Vec<Series> {
        self.inner
            .series
            .iter()
            .map(|entry| Series {
                key: entry.key().clone(),
                value: entry.value().value(),
            })
            .collect()
    }
}

impl CounterSource for Registry {
    fn counter(&self, key: MetricKey) -> Counter {
        Registry::counter(self, key)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("series", &self.len())
            .finish()
    }
}

/// Builder for [`Registry`].
pub struct RegistryBuilder {
    listener: Option<SeriesListener>,
}

impl RegistryBuilder {
    /// Register a callback invoked once per newly created series,
    /// before the series becomes visible to other resolvers. Intended
    /// for an export layer that wants to learn about new time series
    /// as they appear.
    ///
    /// The callback runs while the shard owning the new key is locked;
    /// it must not resolve counters on the same registry.
    pub fn on_series_created(
        mut self,
        listener: impl Fn(&MetricKey) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Build the registry.
    pub fn build(self) -> Registry {
        Registry {
            inner: Arc::new(RegistryInner {
                series: DashMap::default(),
                listener: self.listener,
            }),
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Tag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn requests(state: &'static str) -> MetricKey {
        MetricKey::new("requests", [Tag::new("state", state)]).unwrap()
    }

    #[test]
    fn resolution_is_idempotent() {
        let registry = Registry::new();
        let a = registry.counter(requests("sent"));
        let b = registry.counter(requests("sent"));

        assert!(a.same_series(&b));
        assert_eq!(registry.len(), 1);

        a.add(2);
        b.add(3);
        assert_eq!(a.value(), 5);
    }

    #[test]
    fn resolution_ignores_caller_tag_order() {
        let registry = Registry::new();
        let a = registry.counter(
            MetricKey::new("rpc", [Tag::new("method", "get"), Tag::new("code", "ok")]).unwrap(),
        );
        let b = registry.counter(
            MetricKey::new("rpc", [Tag::new("code", "ok"), Tag::new("method", "get")]).unwrap(),
        );
        assert!(a.same_series(&b));
    }

    #[test]
    fn distinct_keys_get_distinct_counters() {
        let registry = Registry::new();
        let sent = registry.counter(requests("sent"));
        let failed = registry.counter(requests("failed"));

        assert!(!sent.same_series(&failed));
        sent.increment();
        assert_eq!(sent.value(), 1);
        assert_eq!(failed.value(), 0);
    }

    #[test]
    fn racing_creators_converge_on_one_accumulator() {
        let registry = Registry::new();
        let n = 16;
        let barrier = Arc::new(Barrier::new(n));

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let counter = registry.counter(requests("sent"));
                    counter.increment();
                    counter
                })
            })
            .collect();

        let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        for counter in &counters {
            assert!(counter.same_series(&counters[0]));
        }
        // One increment per thread, none lost to a discarded duplicate.
        assert_eq!(counters[0].value(), n as u64);
    }

    #[test]
    fn listener_fires_once_per_series() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = {
            let created = created.clone();
            Registry::builder()
                .on_series_created(move |_| {
                    created.fetch_add(1, Ordering::SeqCst);
                })
                .build()
        };

        registry.counter(requests("sent"));
        registry.counter(requests("sent"));
        registry.counter(requests("failed"));

        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn snapshot_reports_all_series() {
        let registry = Registry::new();
        registry.counter(requests("sent")).add(10);
        registry.counter(requests("failed")).add(2);

        let mut snapshot = registry.snapshot();
        snapshot.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, requests("failed"));
        assert_eq!(snapshot[0].value, 2);
        assert_eq!(snapshot[1].key, requests("sent"));
        assert_eq!(snapshot[1].value, 10);
    }

    #[test]
    fn clones_share_state() {
        let registry = Registry::new();
        let clone = registry.clone();
        let a = registry.counter(requests("sent"));
        let b = clone.counter(requests("sent"));
        assert!(a.same_series(&b));
        assert_eq!(clone.len(), 1);
    }
}
