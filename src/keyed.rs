//! Pre-resolved counter caches keyed by a single tag's value.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::marker::PhantomData;

use rustc_hash::FxHasher;

use crate::counter::Counter;
use crate::error::{MetricError, MetricResult};
use crate::key::{MetricKey, Tag};
use crate::registry::CounterSource;

/// A closed, statically enumerable domain of tag values.
///
/// `VALUES` lists every member; `ordinal` must return the member's
/// position in that list, and `as_str` the tag value it is recorded
/// under.
///
/// # Example
///
/// ```
/// use tally::TagDomain;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// enum DeliveryState {
///     Sent,
///     Received,
///     Failed,
/// }
///
/// impl TagDomain for DeliveryState {
///     const VALUES: &'static [Self] = &[Self::Sent, Self::Received, Self::Failed];
///
///     fn ordinal(&self) -> usize {
///         *self as usize
///     }
///
///     fn as_str(&self) -> &'static str {
///         match self {
///             Self::Sent => "sent",
///             Self::Received => "received",
///             Self::Failed => "failed",
///         }
///     }
/// }
/// ```
pub trait TagDomain: Copy + 'static {
    /// Every member of the domain, in ordinal order.
    const VALUES: &'static [Self];

    /// The member's position within [`VALUES`](TagDomain::VALUES).
    fn ordinal(&self) -> usize;

    /// The tag value the member is recorded under.
    fn as_str(&self) -> &'static str;
}

/// Counters for one metric, pre-resolved per member of a closed tag
/// domain and indexed by ordinal.
///
/// Built once at construction time; the hot path is an array index,
/// no hashing and no key building.
pub struct KeyedCounters<T> {
    counters: Box<[Counter]>,
    _domain: PhantomData<T>,
}

impl<T: TagDomain> KeyedCounters<T> {
    /// Eagerly resolve one counter per member of `T`'s domain, tagging
    /// `name` with `tag_key` set to each member's string value.
    ///
    /// Fails with [`MetricError::Config`] if `T::ordinal` disagrees
    /// with the order of `T::VALUES`, or with
    /// [`MetricError::InvalidKey`] if the name or tag key is invalid.
    pub fn build(
        source: &impl CounterSource,
        name: impl Into<Cow<'static, str>>,
        tag_key: impl Into<Cow<'static, str>>,
    ) -> MetricResult<Self> {
        let name = name.into();
        let tag_key = tag_key.into();

        let mut counters = Vec::with_capacity(T::VALUES.len());
        for (position, member) in T::VALUES.iter().enumerate() {
            if member.ordinal() != position {
                return Err(MetricError::Config(format!(
                    "TagDomain ordinal mismatch: member \"{}\" at position {position} reports ordinal {}",
                    member.as_str(),
                    member.ordinal(),
                )));
            }
            let key = MetricKey::new(name.clone(), [Tag::new(tag_key.clone(), member.as_str())])?;
            counters.push(source.counter(key));
        }

        Ok(KeyedCounters {
            counters: counters.into_boxed_slice(),
            _domain: PhantomData,
        })
    }

    /// The counter for `value`, by ordinal index.
    ///
    /// Fails with [`MetricError::UnknownTagValue`] if `value`'s
    /// ordinal falls outside the domain fixed at build time.
    pub fn get(&self, value: T) -> MetricResult<&Counter> {
        self.counters
            .get(value.ordinal())
            .ok_or_else(|| MetricError::UnknownTagValue(value.as_str().to_owned()))
    }

    /// The number of domain members this cache was built over.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the domain is empty.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl<T> fmt::Debug for KeyedCounters<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCounters")
            .field("len", &self.counters.len())
            .finish()
    }
}

/// Hash-backed fallback for tag domains only known at runtime.
///
/// Built once over a fixed value set and never mutated after; lookups
/// hash the queried value but build no key and take no registry lock.
/// Prefer [`KeyedCounters`] when the domain can be enumerated
/// statically; the array index is a little faster, but either way the
/// win that matters is resolving the handles once.
pub struct DynamicKeyedCounters {
    counters: HashMap<Box<str>, Counter, BuildHasherDefault<FxHasher>>,
}

impl DynamicKeyedCounters {
    /// Eagerly resolve one counter per entry of `values`.
    pub fn build<V>(
        source: &impl CounterSource,
        name: impl Into<Cow<'static, str>>,
        tag_key: impl Into<Cow<'static, str>>,
        values: impl IntoIterator<Item = V>,
    ) -> MetricResult<Self>
    where
        V: Into<Cow<'static, str>>,
    {
        let name = name.into();
        let tag_key = tag_key.into();

        let mut counters = HashMap::default();
        for value in values {
            let value = value.into();
            let key = MetricKey::new(name.clone(), [Tag::new(tag_key.clone(), value.clone())])?;
            counters.insert(Box::from(value.as_ref()), source.counter(key));
        }

        Ok(DynamicKeyedCounters { counters })
    }

    /// The counter for `value`.
    ///
    /// Fails with [`MetricError::UnknownTagValue`] for values outside
    /// the set fixed at build time.
    pub fn get(&self, value: &str) -> MetricResult<&Counter> {
        self.counters
            .get(value)
            .ok_or_else(|| MetricError::UnknownTagValue(value.to_owned()))
    }

    /// The number of values this cache was built over.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the value set is empty.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl fmt::Debug for DynamicKeyedCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicKeyedCounters")
            .field("len", &self.counters.len())
            .finish()
    }
}
