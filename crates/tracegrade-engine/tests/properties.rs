//! Property tests: annotation results over arbitrary footprints.
//!
//! Footprints are generated with strictly increasing timestamps, so "first
//! entry" and "earliest timestamp" coincide.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tracegrade::footprint::{FootprintEntry, MemoryFootprint};
use tracegrade::{
    classify, AnnotationRef, BeforeAnnotation, ClassifierConfig, ComplexityClass,
    ValueAnnotation,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Integer observations with strictly increasing timestamps.
fn arb_observations() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((-50i64..50, 1i64..5), 0..30).prop_map(|raw| {
        let mut ts = 0;
        raw.into_iter()
            .map(|(value, gap)| {
                ts += gap;
                (value, ts)
            })
            .collect()
    })
}

/// Same as [`arb_observations`] but every value distinct.
fn arb_distinct_observations() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::btree_set(-1000i64..1000, 0..20).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, i as i64 * 3))
            .collect()
    })
}

fn footprint(observations: &[(i64, i64)]) -> MemoryFootprint {
    MemoryFootprint::from_values(
        observations
            .iter()
            .map(|&(value, ts)| FootprintEntry::new(value, ts, None)),
    )
}

fn value(v: i64) -> AnnotationRef {
    AnnotationRef::new(ValueAnnotation::new(v).unwrap())
}

/// Input sizes spanning several orders of magnitude.
fn arb_sizes() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(10u64..100_000, 6..12)
        .prop_map(|sizes| sizes.into_iter().collect::<Vec<_>>())
}

// ---------------------------------------------------------------------------
// Value annotations
// ---------------------------------------------------------------------------

proptest! {
    /// A value annotation is satisfied exactly when the value was observed,
    /// and then at the timestamp of its first observation.
    #[test]
    fn value_satisfied_at_first_observation(
        observations in arb_observations(),
        target in -50i64..50,
    ) {
        let fp = footprint(&observations);
        let result = value(target).check(&fp).unwrap();
        let first = observations.iter().find(|(v, _)| *v == target);

        prop_assert_eq!(result.satisfied(), first.is_some());
        match first {
            Some(&(_, ts)) => prop_assert_eq!(result.satisfied_at(), ts),
            None => prop_assert_eq!(result.satisfied_at(), -1),
        }
    }

    /// Nothing is satisfied by an empty footprint.
    #[test]
    fn empty_footprint_satisfies_nothing(target in any::<i64>()) {
        let result = value(target).check(&MemoryFootprint::new()).unwrap();
        prop_assert!(!result.satisfied());
        prop_assert_eq!(result.satisfied_at(), -1);
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

proptest! {
    /// `a before b` holds iff both hold and `a` was not seen after `b`;
    /// swapping the operands flips it unless they were seen together.
    #[test]
    fn before_follows_timestamps(
        observations in arb_observations(),
        a in -50i64..50,
        b in -50i64..50,
    ) {
        let fp = footprint(&observations);
        let (left, right) = (value(a), value(b));
        let l = left.check(&fp).unwrap();
        let r = right.check(&fp).unwrap();

        let forward = AnnotationRef::new(left.before(&right)).check(&fp).unwrap();
        let expected = l.satisfied() && r.satisfied() && l.satisfied_at() <= r.satisfied_at();
        prop_assert_eq!(forward.satisfied(), expected);

        let backward = AnnotationRef::new(BeforeAnnotation::new(vec![right, left]))
            .check(&fp)
            .unwrap();
        if l.satisfied() && r.satisfied() && l.satisfied_at() != r.satisfied_at() {
            prop_assert_ne!(forward.satisfied(), backward.satisfied());
        }
    }

    /// Boolean connectives agree with their truth tables.
    #[test]
    fn connectives_match_truth_tables(
        observations in arb_observations(),
        a in -50i64..50,
        b in -50i64..50,
    ) {
        let fp = footprint(&observations);
        let (left, right) = (value(a), value(b));
        let l = left.check(&fp).unwrap().satisfied();
        let r = right.check(&fp).unwrap().satisfied();

        let and = AnnotationRef::new(left.and(&right)).check(&fp).unwrap();
        let or = AnnotationRef::new(left.or(&right)).check(&fp).unwrap();
        let xor = AnnotationRef::new(left.xor(&right)).check(&fp).unwrap();
        let not = AnnotationRef::new(left.not()).check(&fp).unwrap();

        prop_assert_eq!(and.satisfied(), l && r);
        prop_assert_eq!(or.satisfied(), l || r);
        prop_assert_eq!(xor.satisfied(), l != r);
        prop_assert_eq!(not.satisfied(), !l);
    }
}

// ---------------------------------------------------------------------------
// Footprints
// ---------------------------------------------------------------------------

proptest! {
    /// Combining a single footprint reproduces it.
    #[test]
    fn singleton_combine_is_identity(observations in arb_distinct_observations()) {
        let fp = footprint(&observations);
        let combined = MemoryFootprint::combine([&fp]);
        prop_assert_eq!(combined, fp);
    }
}

// ---------------------------------------------------------------------------
// Complexity
// ---------------------------------------------------------------------------

proptest! {
    /// Exact quadratic and constant step counts are classified as such.
    #[test]
    fn exact_growth_is_recognised(sizes in arb_sizes(), scale in 1i64..5) {
        let config = ClassifierConfig::default();
        let classes = ComplexityClass::builtin(&config);

        let quadratic: BTreeMap<u64, i64> =
            sizes.iter().map(|&n| (n, scale * (n * n) as i64)).collect();
        let best = classify(&quadratic, &classes, &config).unwrap();
        prop_assert_eq!(best.name(), "quadratic");

        let constant: BTreeMap<u64, i64> = sizes.iter().map(|&n| (n, 7 * scale)).collect();
        let best = classify(&constant, &classes, &config).unwrap();
        prop_assert_eq!(best.name(), "constant");
    }
}
