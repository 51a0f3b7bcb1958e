//! Grading a program whose expected values depend on its input.
//!
//! The student program receives a random `seed`, builds `seed * 3` and
//! wraps it in a `Bucket` object. The reference cannot know the seed
//! ahead of time, so it accepts an initial condition and a structural
//! pattern instead of fixed values.

use tracegrade::footprint::{Event, MemoryFootprint, Object, Value};
use tracegrade::{
    AnnotationCollector, AnnotationExt, InitialCondition, ReferenceImplementation, StructuralPattern,
    ValueAnnotation, ValueOptions,
};

fn reference() -> ReferenceImplementation {
    let seed = InitialCondition::new("seed");
    let mut collector = AnnotationCollector::new();
    collector
        .track(
            ValueAnnotation::from_initial_condition(&seed * 3, ValueOptions::default())
                .unwrap()
                .named("tripled")
                .with_success_message("tripled the seed")
                .with_failure_message("the seed was never tripled"),
        )
        .unwrap();
    let bucket = StructuralPattern::new("store.Bucket")
        .unwrap()
        .with_attribute("label", "seeded")
        .unwrap();
    collector
        .track(
            ValueAnnotation::structural(bucket)
                .named("bucket")
                .with_success_message("stored the result")
                .with_failure_message("no labelled bucket"),
        )
        .unwrap();
    collector.into_reference("seeded")
}

fn student(seed: i64, factor: i64) -> MemoryFootprint {
    let mut fp = MemoryFootprint::new();
    fp.set_initial_condition("seed", seed);
    for value in [
        Value::Int(seed),
        Value::Int(seed * factor),
        Object::new("Bucket")
            .with_attribute("label", "seeded")
            .with_attribute("value", seed * factor)
            .into(),
    ] {
        fp.increment_counter();
        fp.add_value(value, None, Some(Event::Line), false);
    }
    fp
}

#[test]
fn passes_for_any_seed() {
    let reference = reference();
    for seed in [1, 7, 1234] {
        let result = reference.run(&student(seed, 3), None).unwrap();
        assert!(result.correct(), "seed {seed}");
        assert_eq!(result.messages(), vec!["tripled the seed", "stored the result"]);
    }
}

#[test]
fn wrong_factor_fails() {
    let result = reference().run(&student(5, 2), None).unwrap();
    assert!(!result.correct());
    assert_eq!(result.messages(), vec!["the seed was never tripled", "stored the result"]);
}

#[test]
fn missing_seed_is_unsatisfied() {
    let seeded = student(5, 3);
    let mut bare = MemoryFootprint::new();
    for entry in &seeded {
        bare.increment_counter();
        bare.add_value(entry.value.clone(), None, Some(Event::Line), false);
    }
    assert!(bare.initial_conditions().is_empty());
    let result = reference().run(&bare, None).unwrap();
    assert!(!result.correct());
    assert_eq!(result.messages()[0], "the seed was never tripled");
}
