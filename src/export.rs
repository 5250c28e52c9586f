//! The boundary consumed by an export layer.
//!
//! Serialization into a wire or text format, and the push/pull cadence
//! driving it, live outside this crate. The registry only promises it
//! can enumerate every series as a `{key, value}` pair.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::MetricResult;
use crate::key::MetricKey;

/// One exported data point: the series identity and its accumulated
/// total at snapshot time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Series {
    /// The series identity.
    pub key: MetricKey,
    /// The accumulated total at snapshot time.
    pub value: u64,
}

/// Receives snapshot batches from a registry.
pub trait Exporter: Send + Sync {
    /// Export one snapshot batch.
    fn export(&self, batch: &[Series]) -> MetricResult<()>;
}

/// An exporter that stores batches in memory.
///
/// Useful for testing and debugging. Clones share the same store.
///
/// # Example
///
/// ```
/// use tally::{Exporter, InMemoryExporter, MetricKey, Registry};
///
/// let registry = Registry::new();
/// registry.counter(MetricKey::new("requests", [])?).add(7);
///
/// let exporter = InMemoryExporter::default();
/// exporter.export(&registry.snapshot())?;
///
/// let batches = exporter.finished_batches()?;
/// assert_eq!(batches[0][0].value, 7);
/// # Ok::<(), tally::MetricError>(())
/// ```
pub struct InMemoryExporter {
    batches: Arc<Mutex<VecDeque<Vec<Series>>>>,
}

impl Clone for InMemoryExporter {
    fn clone(&self) -> Self {
        InMemoryExporter {
            batches: self.batches.clone(),
        }
    }
}

impl Default for InMemoryExporter {
    fn default() -> Self {
        InMemoryExporterBuilder::new().build()
    }
}

impl fmt::Debug for InMemoryExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryExporter").finish()
    }
}

impl InMemoryExporter {
    /// Every batch exported so far, oldest first.
    pub fn finished_batches(&self) -> MetricResult<Vec<Vec<Series>>> {
        self.batches
            .lock()
            .map(|batches| batches.iter().cloned().collect())
            .map_err(Into::into)
    }

    /// Drop all stored batches.
    pub fn reset(&self) -> MetricResult<()> {
        self.batches
            .lock()
            .map(|mut batches| batches.clear())
            .map_err(Into::into)
    }
}

impl Exporter for InMemoryExporter {
    fn export(&self, batch: &[Series]) -> MetricResult<()> {
        self.batches
            .lock()
            .map(|mut batches| batches.push_back(batch.to_vec()))
            .map_err(Into::into)
    }
}

/// Builder for [`InMemoryExporter`].
#[derive(Debug, Default)]
pub struct InMemoryExporterBuilder {
    _private: (),
}

impl InMemoryExporterBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        InMemoryExporterBuilder::default()
    }

    /// Build the exporter.
    pub fn build(self) -> InMemoryExporter {
        InMemoryExporter {
            batches: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}
