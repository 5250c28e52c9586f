//! Metric identity: a name plus a normalized tag set.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::{MetricError, MetricResult};

// maximum length of a metric name
const METRIC_NAME_MAX_LENGTH: usize = 255;
const METRIC_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

// key validation error strings
const METRIC_NAME_EMPTY: &str = "metric name must be non-empty";
const METRIC_NAME_LENGTH: &str = "metric name must be less than 256 characters";
const METRIC_NAME_INVALID_CHAR: &str =
    "characters in metric name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
const METRIC_NAME_FIRST_ALPHABETIC: &str = "metric name must start with an alphabetic character";
const TAG_KEY_EMPTY: &str = "tag keys must be non-empty";

/// A key-value annotation that partitions a metric into sub-series.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    /// The tag key.
    pub key: Cow<'static, str>,
    /// The tag value.
    pub value: Cow<'static, str>,
}

impl Tag {
    /// Create a new tag pair.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

/// The immutable identity of a metric: a name plus a normalized set of
/// tags, usable as a map key without re-hashing on every lookup.
///
/// Construction sorts tags by key and deduplicates them (the last
/// occurrence of a duplicated key wins), so two keys built from the
/// same logical tag set compare equal regardless of caller-supplied
/// order. The hash is computed once here and stored; [`Hash`] only
/// writes the stored value.
// Serialize only: a deserialized key would bypass normalization and
// carry an untrusted stored hash.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricKey {
    name: Cow<'static, str>,
    tags: Box<[Tag]>,
    hash: u64,
}

impl MetricKey {
    /// Build a key from a name and any iterable of tags.
    ///
    /// Fails with [`MetricError::InvalidKey`] if the name is empty,
    /// too long, starts with a non-alphabetic character, contains a
    /// character outside ASCII alphanumerics and `_`, `.`, `-`, `/`,
    /// or if any tag key is empty.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> MetricResult<Self> {
        let name = name.into();
        validate_name(&name)?;

        let mut tags: Vec<Tag> = tags.into_iter().collect();
        if tags.iter().any(|t| t.key.is_empty()) {
            return Err(MetricError::InvalidKey(TAG_KEY_EMPTY));
        }
        tags.sort_by(|a, b| a.key.cmp(&b.key));

        // Vec::dedup_by removes the last duplicate; we need to keep it.
        if tags.len() > 1 {
            let mut i = tags.len() - 1;
            while i != 0 {
                if tags[i - 1].key == tags[i].key {
                    tags.remove(i - 1);
                }
                i -= 1;
            }
        }

        let hash = calculate_hash(&name, &tags);
        Ok(MetricKey {
            name,
            tags: tags.into_boxed_slice(),
            hash,
        })
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized tags, sorted by key.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

fn validate_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::InvalidKey(METRIC_NAME_EMPTY));
    }
    if name.len() > METRIC_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidKey(METRIC_NAME_LENGTH));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(MetricError::InvalidKey(METRIC_NAME_FIRST_ALPHABETIC));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !METRIC_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(MetricError::InvalidKey(METRIC_NAME_INVALID_CHAR));
    }
    Ok(())
}

fn calculate_hash(name: &str, tags: &[Tag]) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    tags.iter().fold(&mut hasher, |hasher, tag| {
        tag.hash(hasher);
        hasher
    });
    hasher.finish()
}

impl PartialEq for MetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.name == other.name && self.tags == other.tags
    }
}

impl Eq for MetricKey {}

impl Hash for MetricKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}=\"{}\"", tag.key, tag.value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &MetricKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn tag_order_does_not_matter() {
        let a = MetricKey::new(
            "requests",
            [Tag::new("method", "GET"), Tag::new("status", "200")],
        )
        .unwrap();
        let b = MetricKey::new(
            "requests",
            [Tag::new("status", "200"), Tag::new("method", "GET")],
        )
        .unwrap();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn duplicate_tag_keys_keep_last_value() {
        let key = MetricKey::new(
            "requests",
            [Tag::new("status", "200"), Tag::new("status", "500")],
        )
        .unwrap();

        assert_eq!(key.tags().len(), 1);
        assert_eq!(key.tags()[0].value, "500");
    }

    #[test]
    fn distinct_tag_values_are_distinct_keys() {
        let a = MetricKey::new("requests", [Tag::new("status", "200")]).unwrap();
        let b = MetricKey::new("requests", [Tag::new("status", "500")]).unwrap();
        assert_ne!(a, b);
    }

    #[rstest]
    #[case("")]
    #[case("1starts_with_digit")]
    #[case("_starts_with_underscore")]
    #[case("has space")]
    #[case("has{brace")]
    fn invalid_names_are_rejected(#[case] name: &'static str) {
        assert!(matches!(
            MetricKey::new(name, []),
            Err(MetricError::InvalidKey(_))
        ));
    }

    #[rstest]
    #[case("requests")]
    #[case("http.server.request_count")]
    #[case("cache/hits-total")]
    fn valid_names_are_accepted(#[case] name: &'static str) {
        assert!(MetricKey::new(name, []).is_ok());
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = format!("a{}", "b".repeat(255));
        assert!(matches!(
            MetricKey::new(name, []),
            Err(MetricError::InvalidKey(_))
        ));
    }

    #[test]
    fn empty_tag_key_is_rejected() {
        assert!(matches!(
            MetricKey::new("requests", [Tag::new("", "x")]),
            Err(MetricError::InvalidKey(_))
        ));
    }

    #[test]
    fn display_renders_exposition_style() {
        let key = MetricKey::new(
            "requests",
            [Tag::new("status", "200"), Tag::new("method", "GET")],
        )
        .unwrap();
        assert_eq!(key.to_string(), "requests{method=\"GET\",status=\"200\"}");

        let bare = MetricKey::new("uptime", []).unwrap();
        assert_eq!(bare.to_string(), "uptime");
    }
}
