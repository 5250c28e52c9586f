//! # Tally
//!
//! An allocation-minimal, concurrency-safe registry for monotonic
//! counters, built for services that record hundreds of millions of
//! measurements per minute.
//!
//! The registry resolves a metric name plus a small set of tag values
//! to a durable [`Counter`] handle exactly once; thereafter the hot
//! path is a single relaxed atomic add with no key construction, no
//! map lookup, and no heap allocation. A [`CompositeRegistry`] fans
//! one logical update out to several sink registries through a
//! fan-out list materialized once per key, never re-derived per call.
//!
//! # Usage
//!
//! Resolve handles at component-construction time and store them;
//! call only [`Counter::increment`]/[`Counter::add`] afterwards.
//!
//! ```
//! use tally::{KeyedCounters, Registry, TagDomain};
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Debug)]
//! enum DeliveryState {
//!     Sent,
//!     Received,
//!     Failed,
//! }
//!
//! impl TagDomain for DeliveryState {
//!     const VALUES: &'static [Self] = &[Self::Sent, Self::Received, Self::Failed];
//!
//!     fn ordinal(&self) -> usize {
//!         *self as usize
//!     }
//!
//!     fn as_str(&self) -> &'static str {
//!         match self {
//!             Self::Sent => "sent",
//!             Self::Received => "received",
//!             Self::Failed => "failed",
//!         }
//!     }
//! }
//!
//! let registry = Registry::new();
//!
//! // Construction time: one counter per delivery state, array-indexed.
//! let requests = KeyedCounters::<DeliveryState>::build(&registry, "requests", "state")?;
//!
//! // Hot path: an array index and an atomic add.
//! requests.get(DeliveryState::Sent)?.increment();
//! # Ok::<(), tally::MetricError>(())
//! ```
//!
//! Calling [`Registry::counter`] directly on the hot path stays
//! correct, but pays key normalization and a map lookup per call; it
//! is the pattern this crate exists to steer callers away from.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![cfg_attr(test, deny(warnings))]

mod composite;
mod counter;
mod error;
mod export;
mod key;
mod keyed;
mod registry;

pub use composite::CompositeRegistry;
pub use counter::Counter;
pub use error::{MetricError, MetricResult};
pub use export::{Exporter, InMemoryExporter, InMemoryExporterBuilder, Series};
pub use key::{MetricKey, Tag};
pub use keyed::{DynamicKeyedCounters, KeyedCounters, TagDomain};
pub use registry::{CounterSource, Registry, RegistryBuilder};
