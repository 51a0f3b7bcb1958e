use serde_json::{json, Map};
use tracegrade_footprint::MemoryFootprint;

use super::{Annotation, AnnotationMeta, Evaluation, Witness};
use crate::complexity::{classify, samples_from_records, ComplexityClass, ComplexityUnion};
use crate::config::ClassifierConfig;
use crate::error::{VerifyError, VerifyResult};

/// Asserts the time complexity of a named, measured block of code.
///
/// The name ties the annotation to the complexity records the tracer
/// stored under the same name. The result's witness is the best-fit class
/// whether or not it matches the assertion.
#[derive(Debug, Clone)]
pub struct TimeComplexity {
    meta: AnnotationMeta,
    expected: ComplexityUnion,
    additional: Vec<ComplexityClass>,
    config: ClassifierConfig,
}

impl TimeComplexity {
    pub fn new(expected: impl Into<ComplexityUnion>, name: impl Into<String>) -> VerifyResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(VerifyError::MissingName("complexity"));
        }
        Ok(Self {
            meta: AnnotationMeta {
                name: Some(name),
                ..Default::default()
            },
            expected: expected.into(),
            additional: Vec::new(),
            config: ClassifierConfig::default(),
        })
    }

    /// Extra classes to consider besides the built-in ones.
    pub fn with_additional(mut self, classes: impl IntoIterator<Item = ComplexityClass>) -> Self {
        self.additional.extend(classes);
        self
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expected(&self) -> &ComplexityUnion {
        &self.expected
    }

    /// Built-in classes, then asserted custom classes, then the additional
    /// ones, without repeats.
    fn candidates(&self) -> Vec<ComplexityClass> {
        let mut candidates = ComplexityClass::builtin(&self.config);
        let extra = self
            .expected
            .classes()
            .iter()
            .filter(|c| c.is_custom())
            .chain(&self.additional);
        for class in extra {
            if !candidates.contains(class) {
                candidates.push(*class);
            }
        }
        candidates
    }
}

impl Annotation for TimeComplexity {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "time_complexity"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let name = self.meta.name.as_deref().unwrap_or_default();
        let records = footprint
            .iter()
            .filter_map(|entry| entry.value.as_complexity())
            .filter(|record| record.name == name);
        let samples = samples_from_records(records);
        if samples.is_empty() {
            return Ok(Evaluation::leaf(false));
        }

        let Some(best) = classify(&samples, &self.candidates(), &self.config) else {
            return Ok(Evaluation::leaf(false));
        };
        let satisfied = self.expected.contains(&best);
        Ok(Evaluation::leaf(satisfied).with_witness(Witness::Complexity(best), -1))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("complexity".into(), json!(self.expected.to_string()));
        let additional: Vec<&str> = self.additional.iter().map(ComplexityClass::name).collect();
        fields.insert("additional_complexities".into(), json!(additional));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationRef;
    use crate::complexity::CustomComplexity;
    use tracegrade_footprint::ComplexityRecord;

    fn footprint(name: &str, steps: impl Fn(u64) -> i64) -> MemoryFootprint {
        let mut fp = MemoryFootprint::new();
        let mut clock = 0;
        for n in [10u64, 100, 1000, 5000] {
            let stop = clock + steps(n);
            fp.add_complexity_record(ComplexityRecord::new(name, n, clock, stop), None);
            clock = stop + 1;
        }
        fp.add_value("noise", Some(clock), None, false);
        fp
    }

    fn check(annotation: TimeComplexity, fp: &MemoryFootprint) -> (bool, Option<ComplexityClass>) {
        let res = AnnotationRef::new(annotation).check(fp).unwrap();
        let best = match res.witness() {
            Some(Witness::Complexity(c)) => Some(*c),
            _ => None,
        };
        (res.satisfied(), best)
    }

    #[test]
    fn matching_class() {
        let fp = footprint("sort", |n| (3 * n * n) as i64);
        let ann = TimeComplexity::new(ComplexityClass::Quadratic, "sort").unwrap();
        assert_eq!(check(ann, &fp), (true, Some(ComplexityClass::Quadratic)));
    }

    #[test]
    fn mismatch_still_reports_best_fit() {
        let fp = footprint("sort", |n| 2 * n as i64 + 5);
        let ann = TimeComplexity::new(ComplexityClass::Quadratic, "sort").unwrap();
        assert_eq!(check(ann, &fp), (false, Some(ComplexityClass::Linear)));
    }

    #[test]
    fn union_accepts_any_member() {
        let fp = footprint("scan", |n| 7 * n as i64);
        let ann = TimeComplexity::new(
            ComplexityClass::Linear | ComplexityClass::Linearithmic,
            "scan",
        )
        .unwrap();
        assert!(check(ann, &fp).0);
    }

    #[test]
    fn only_records_with_matching_name() {
        let mut fp = footprint("fast", |_| 40);
        let slow = footprint("slow", |n| (n * n) as i64);
        fp = MemoryFootprint::combine([&fp, &slow]);
        let ann = TimeComplexity::new(ComplexityClass::Constant, "fast").unwrap();
        assert_eq!(check(ann, &fp), (true, Some(ComplexityClass::Constant)));
    }

    #[test]
    fn custom_asserted_class_is_a_candidate() {
        fn sqrt_features(n: f64) -> Vec<f64> {
            vec![1.0, n.sqrt()]
        }
        let sqrt = ComplexityClass::Custom(CustomComplexity {
            name: "sqrt",
            features: sqrt_features,
            steps: None,
        });
        let fp = footprint("root", |n| (50.0 * (n as f64).sqrt()).round() as i64);
        let ann = TimeComplexity::new(sqrt, "root").unwrap();
        assert_eq!(check(ann, &fp), (true, Some(sqrt)));
    }

    #[test]
    fn no_records_is_unsatisfied() {
        let ann = TimeComplexity::new(ComplexityClass::Constant, "absent").unwrap();
        assert_eq!(check(ann, &MemoryFootprint::new()), (false, None));
    }

    #[test]
    fn name_is_required() {
        assert_eq!(
            TimeComplexity::new(ComplexityClass::Linear, "").unwrap_err(),
            VerifyError::MissingName("complexity")
        );
    }

    #[test]
    fn dict_form() {
        let ann: AnnotationRef = TimeComplexity::new(ComplexityClass::Linear | ComplexityClass::Quadratic, "t")
            .unwrap()
            .into();
        let d = ann.to_dict();
        assert_eq!(d["type"], "time_complexity");
        assert_eq!(d["name"], "t");
        assert_eq!(d["complexity"], "linear | quadratic");
    }
}
