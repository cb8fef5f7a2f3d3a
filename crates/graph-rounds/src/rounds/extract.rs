//! Aggregate readers shared by the algorithm extractors
//!
//! Every extractor knows exactly which keys its rule can count. Anything else
//! in the aggregate means the round ran the wrong rule or a unit misbehaved.

use super::aggregate::{Aggregate, AggregateKey, CounterTag};
use super::algorithm::Verdict;
use super::error::ConsistencyError;
use crate::graph::VertexId;

/// Read a single named counter, rejecting any other key
pub fn single_counter(aggregate: &Aggregate, tag: CounterTag) -> Result<u64, ConsistencyError> {
    if let Some(key) = aggregate
        .keys()
        .find(|key| **key != AggregateKey::Tag(tag))
    {
        return Err(ConsistencyError::new(format!(
            "unexpected key {} (only {} is counted)",
            key,
            tag.as_str()
        )));
    }
    Ok(aggregate.count(tag))
}

/// Converge when a counter is zero, otherwise continue with `next`
pub fn converge_on_zero<P>(
    aggregate: &Aggregate,
    tag: CounterTag,
    next: impl FnOnce() -> P,
) -> Result<Verdict<P>, ConsistencyError> {
    match single_counter(aggregate, tag)? {
        0 => Ok(Verdict::Converged),
        _ => Ok(Verdict::Continue(next())),
    }
}

/// Read all `(new, ambassador)` pairs, rejecting named counters
pub fn pairs(aggregate: &Aggregate) -> Result<Vec<(VertexId, VertexId)>, ConsistencyError> {
    aggregate
        .iter()
        .map(|(key, _)| match key {
            AggregateKey::Pair { new, ambassador } => Ok((*new, *ambassador)),
            AggregateKey::Tag(tag) => Err(ConsistencyError::new(format!(
                "unexpected counter {} in a pair aggregate",
                tag.as_str()
            ))),
        })
        .collect()
}

/// Require an empty aggregate
pub fn expect_empty(aggregate: &Aggregate) -> Result<(), ConsistencyError> {
    match aggregate.keys().next() {
        Some(key) => Err(ConsistencyError::new(format!("unexpected key {}", key))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounds::aggregate::Counters;

    fn aggregate(keys: &[AggregateKey]) -> Aggregate {
        let mut counters = Counters::new();
        for key in keys {
            counters.increment(*key);
        }
        counters.into()
    }

    #[test]
    fn test_single_counter() {
        let agg = aggregate(&[CounterTag::Visited.into(), CounterTag::Visited.into()]);
        assert_eq!(single_counter(&agg, CounterTag::Visited).unwrap(), 2);
        assert!(single_counter(&agg, CounterTag::Updated).is_err());
        assert_eq!(single_counter(&Aggregate::default(), CounterTag::Updated).unwrap(), 0);
    }

    #[test]
    fn test_converge_on_zero() {
        let verdict = converge_on_zero(&Aggregate::default(), CounterTag::Changed, || 1).unwrap();
        assert_eq!(verdict, Verdict::Converged);

        let agg = aggregate(&[CounterTag::Changed.into()]);
        let verdict = converge_on_zero(&agg, CounterTag::Changed, || 7).unwrap();
        assert_eq!(verdict, Verdict::Continue(7));
    }

    #[test]
    fn test_pairs() {
        let agg = aggregate(&[
            AggregateKey::pair(VertexId(11), VertexId(2)),
            AggregateKey::pair(VertexId(10), VertexId(4)),
        ]);
        assert_eq!(
            pairs(&agg).unwrap(),
            vec![(VertexId(10), VertexId(4)), (VertexId(11), VertexId(2))]
        );

        let mixed = aggregate(&[
            CounterTag::Visited.into(),
            AggregateKey::pair(VertexId(10), VertexId(4)),
        ]);
        assert!(pairs(&mixed).is_err());
    }

    #[test]
    fn test_expect_empty() {
        assert!(expect_empty(&Aggregate::default()).is_ok());
        assert!(expect_empty(&aggregate(&[CounterTag::Updated.into()])).is_err());
    }
}
