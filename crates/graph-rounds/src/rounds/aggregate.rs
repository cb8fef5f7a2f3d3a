//! Round aggregates
//!
//! Merge units count events into their own [`Counters`]. After the merge
//! barrier the executor folds them into one immutable [`Aggregate`] that the
//! driver hands to the extractor unchanged.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::graph::VertexId;

/// Named counters used by the iterative rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterTag {
    /// Vertices reached for the first time (search)
    Visited,
    /// Labels that strictly decreased (component labelling)
    Updated,
    /// Labels that changed (community detection)
    Changed,
}

impl CounterTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterTag::Visited => "visited",
            CounterTag::Updated => "updated",
            CounterTag::Changed => "changed",
        }
    }
}

/// Key of one aggregate entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AggregateKey {
    Tag(CounterTag),
    /// A new vertex linked to an existing one during growth
    Pair { new: VertexId, ambassador: VertexId },
}

impl AggregateKey {
    pub fn pair(new: VertexId, ambassador: VertexId) -> Self {
        Self::Pair { new, ambassador }
    }
}

impl From<CounterTag> for AggregateKey {
    fn from(tag: CounterTag) -> Self {
        Self::Tag(tag)
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateKey::Tag(tag) => f.write_str(tag.as_str()),
            AggregateKey::Pair { new, ambassador } => write!(f, "{},{}", new, ambassador),
        }
    }
}

impl FromStr for AggregateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visited" => Ok(CounterTag::Visited.into()),
            "updated" => Ok(CounterTag::Updated.into()),
            "changed" => Ok(CounterTag::Changed.into()),
            other => {
                let (new, ambassador) = other
                    .split_once(',')
                    .ok_or_else(|| format!("unknown aggregate key {:?}", other))?;
                let new = new
                    .parse::<VertexId>()
                    .map_err(|e| format!("invalid new vertex in {:?}: {}", other, e))?;
                let ambassador = ambassador
                    .parse::<VertexId>()
                    .map_err(|e| format!("invalid ambassador in {:?}: {}", other, e))?;
                Ok(Self::pair(new, ambassador))
            }
        }
    }
}

/// Mutable counters owned by a single merge unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    values: BTreeMap<AggregateKey, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to a counter
    pub fn increment(&mut self, key: impl Into<AggregateKey>) {
        self.add(key, 1);
    }

    /// Add `amount` to a counter
    pub fn add(&mut self, key: impl Into<AggregateKey>, amount: u64) {
        *self.values.entry(key.into()).or_insert(0) += amount;
    }

    /// Fold another unit's counters into this one
    pub fn absorb(&mut self, other: Counters) {
        for (key, amount) in other.values {
            self.add(key, amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Immutable per-round aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    values: BTreeMap<AggregateKey, u64>,
}

impl Aggregate {
    /// Sum the counters of every merge unit
    pub fn from_partials(partials: impl IntoIterator<Item = Counters>) -> Self {
        let mut total = Counters::new();
        for partial in partials {
            total.absorb(partial);
        }
        Self {
            values: total.values,
        }
    }

    /// Count for a key, zero when absent
    pub fn get(&self, key: &AggregateKey) -> u64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Count for a named counter, zero when absent
    pub fn count(&self, tag: CounterTag) -> u64 {
        self.get(&AggregateKey::Tag(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregateKey, u64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &AggregateKey> {
        self.values.keys()
    }
}

impl From<Counters> for Aggregate {
    fn from(counters: Counters) -> Self {
        Self {
            values: counters.values,
        }
    }
}

impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

impl<'de> Deserialize<'de> for Aggregate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, u64>::deserialize(deserializer)?;
        let mut values = BTreeMap::new();
        for (key, count) in raw {
            let key = key.parse::<AggregateKey>().map_err(D::Error::custom)?;
            values.insert(key, count);
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_parse() {
        let key = AggregateKey::pair(VertexId(10), VertexId(3));
        assert_eq!(key.to_string(), "10,3");
        assert_eq!("10,3".parse::<AggregateKey>().unwrap(), key);
        assert_eq!(
            "visited".parse::<AggregateKey>().unwrap(),
            AggregateKey::Tag(CounterTag::Visited)
        );
        assert!("bogus".parse::<AggregateKey>().is_err());
        assert!("1,x".parse::<AggregateKey>().is_err());
    }

    #[test]
    fn test_partials_are_summed() {
        let mut a = Counters::new();
        a.increment(CounterTag::Updated);
        a.increment(CounterTag::Updated);
        let mut b = Counters::new();
        b.increment(CounterTag::Updated);
        b.increment(AggregateKey::pair(VertexId(5), VertexId(1)));

        let aggregate = Aggregate::from_partials(vec![a, b, Counters::new()]);
        assert_eq!(aggregate.count(CounterTag::Updated), 3);
        assert_eq!(aggregate.count(CounterTag::Visited), 0);
        assert_eq!(aggregate.len(), 2);
    }

    #[test]
    fn test_empty_aggregate() {
        let aggregate = Aggregate::from_partials(Vec::new());
        assert!(aggregate.is_empty());
        assert_eq!(aggregate.count(CounterTag::Changed), 0);
    }

    #[test]
    fn test_serializes_as_string_keyed_map() {
        let mut counters = Counters::new();
        counters.add(CounterTag::Visited, 4);
        counters.increment(AggregateKey::pair(VertexId(7), VertexId(2)));
        let aggregate = Aggregate::from(counters);

        let json = serde_json::to_string(&aggregate).unwrap();
        assert_eq!(json, r#"{"visited":4,"7,2":1}"#);

        let restored: Aggregate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, aggregate);
        assert!(serde_json::from_str::<Aggregate>(r#"{"nope":1}"#).is_err());
    }
}
