//! Counter handles and their backing accumulators.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::key::MetricKey;

/// The backing accumulator behind a [`Counter`] handle.
///
/// Implementations must make `add` safe under unbounded concurrent
/// callers without blocking or allocating.
pub(crate) trait CounterCore: Send + Sync {
    fn key(&self) -> &MetricKey;
    fn add(&self, value: u64);
    fn value(&self) -> u64;
}

/// A handle to a monotonic counter.
///
/// Cloning a handle is cheap and both clones update the same
/// accumulator. Obtain the handle once at construction time and call
/// only [`increment`](Counter::increment) or [`add`](Counter::add) on
/// the measurement hot path.
#[derive(Clone)]
pub struct Counter(Arc<dyn CounterCore>);

impl Counter {
    pub(crate) fn new(core: Arc<dyn CounterCore>) -> Self {
        Counter(core)
    }

    /// Add 1 to the accumulator.
    pub fn increment(&self) {
        self.0.add(1);
    }

    /// Atomically add `value` to the accumulator.
    pub fn add(&self, value: u64) {
        self.0.add(value);
    }

    /// A relaxed snapshot of the accumulated total.
    ///
    /// Not required to be linearizable with respect to concurrent
    /// increments; eventual visibility is sufficient for export reads.
    pub fn value(&self) -> u64 {
        self.0.value()
    }

    /// The key this counter was resolved for.
    pub fn key(&self) -> &MetricKey {
        self.0.key()
    }

    /// Whether two handles refer to the same underlying accumulator.
    pub fn same_series(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("key", self.key())
            .field("value", &self.value())
            .finish()
    }
}

/// The canonical registry-owned accumulator: a single relaxed atomic.
pub(crate) struct AtomicCounter {
    key: MetricKey,
    value: AtomicU64,
}

impl AtomicCounter {
    pub(crate) fn new(key: MetricKey) -> Self {
        AtomicCounter {
            key,
            value: AtomicU64::new(0),
        }
    }
}

impl CounterCore for AtomicCounter {
    fn key(&self) -> &MetricKey {
        &self.key
    }

    fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A counter that drops all updates, used when no sink is configured.
pub(crate) struct NoopCounter {
    key: MetricKey,
}

impl NoopCounter {
    pub(crate) fn new(key: MetricKey) -> Self {
        NoopCounter { key }
    }
}

impl CounterCore for NoopCounter {
    fn key(&self) -> &MetricKey {
        &self.key
    }

    fn add(&self, _value: u64) {
        // Ignored
    }

    fn value(&self) -> u64 {
        0
    }
}
