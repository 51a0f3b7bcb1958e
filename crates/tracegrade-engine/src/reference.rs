//! Reference implementations and their results.

use std::collections::HashMap;

use serde_json::json;
use tracegrade_footprint::MemoryFootprint;
use tracing::{info, instrument};

use crate::annotation::{AnnotationRef, AnnotationResult};
use crate::error::{VerifyError, VerifyResult};

/// A named set of top-level annotations to check footprints against.
#[derive(Debug, Clone)]
pub struct ReferenceImplementation {
    name: String,
    annotations: Vec<AnnotationRef>,
}

/// Result of looking annotations up by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    One(AnnotationRef),
    Many(Vec<AnnotationRef>),
}

impl ReferenceImplementation {
    /// Keeps, for each name, only the first `limit` annotations carrying
    /// it (all of them when there is no limit).
    pub fn new(name: impl Into<String>, annotations: impl IntoIterator<Item = AnnotationRef>) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let annotations = annotations
            .into_iter()
            .filter(|ann| {
                let Some(name) = ann.name() else {
                    return true;
                };
                let count = seen.entry(name.to_string()).or_default();
                *count += 1;
                ann.meta().limit.map_or(true, |limit| *count <= limit)
            })
            .collect();
        Self {
            name: name.into(),
            annotations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotations(&self) -> &[AnnotationRef] {
        &self.annotations
    }

    /// Check every annotation, or only those in `group`, against
    /// `footprint`.
    #[instrument(skip(self, footprint), fields(reference = %self.name))]
    pub fn run(
        &self,
        footprint: &MemoryFootprint,
        group: Option<&str>,
    ) -> VerifyResult<ReferenceResult> {
        let selected: Vec<&AnnotationRef> = match group {
            Some(group) => {
                let selected: Vec<_> = self
                    .annotations
                    .iter()
                    .filter(|ann| ann.group() == Some(group))
                    .collect();
                if selected.is_empty() {
                    return Err(VerifyError::GroupNotFound(group.to_string()));
                }
                selected
            }
            None => self.annotations.iter().collect(),
        };

        let results = selected
            .into_iter()
            .map(|ann| ann.check(footprint))
            .collect::<VerifyResult<Vec<_>>>()?;
        let result = ReferenceResult {
            reference: self.clone(),
            results,
            group: group.map(str::to_string),
        };
        info!(
            annotations = result.results.len(),
            correct = result.correct(),
            "reference run complete"
        );
        Ok(result)
    }

    pub fn get(&self, name: &str) -> VerifyResult<Lookup> {
        let mut found: Vec<AnnotationRef> = self
            .annotations
            .iter()
            .filter(|ann| ann.name() == Some(name))
            .cloned()
            .collect();
        match found.len() {
            0 => Err(VerifyError::AnnotationNotFound(name.to_string())),
            1 => Ok(Lookup::One(found.remove(0))),
            _ => Ok(Lookup::Many(found)),
        }
    }

    pub fn to_dict(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "annotations": self.annotations.iter().map(AnnotationRef::to_dict).collect::<Vec<_>>(),
        })
    }
}

/// The results of running one reference against one footprint.
#[derive(Debug, Clone)]
pub struct ReferenceResult {
    reference: ReferenceImplementation,
    results: Vec<AnnotationResult>,
    group: Option<String>,
}

impl ReferenceResult {
    pub fn reference(&self) -> &ReferenceImplementation {
        &self.reference
    }

    pub fn results(&self) -> &[AnnotationResult] {
        &self.results
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn correct(&self) -> bool {
        self.results.iter().all(AnnotationResult::satisfied)
    }

    /// Messages of all results, at most one per annotation name.
    ///
    /// The first message seen for a name holds its position. A later
    /// failure under the same name replaces it; a later success never
    /// does. Messages from unnamed annotations are always kept.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for message in self.results.iter().flat_map(AnnotationResult::messages) {
            match message.name {
                None => messages.push(message.text),
                Some(name) => match positions.get(&name) {
                    Some(&idx) if !message.satisfied => messages[idx] = message.text,
                    Some(_) => {}
                    None => {
                        positions.insert(name, messages.len());
                        messages.push(message.text);
                    }
                },
            }
        }
        messages
    }

    /// 1 for each satisfied result, 0 otherwise.
    pub fn scores(&self) -> Vec<u8> {
        self.results.iter().map(|r| u8::from(r.satisfied())).collect()
    }

    pub fn to_dict(&self) -> serde_json::Value {
        json!({
            "reference": self.reference.name(),
            "group": self.group,
            "correct": self.correct(),
            "messages": self.messages(),
            "results": self.results.iter().map(AnnotationResult::to_dict).collect::<Vec<_>>(),
        })
    }
}

/// Run one footprint against several references.
///
/// With a group, references that do not define it are skipped; it is an
/// error only if none of them does.
pub fn check_references(
    references: &[ReferenceImplementation],
    footprint: &MemoryFootprint,
    group: Option<&str>,
) -> VerifyResult<Vec<ReferenceResult>> {
    let mut results = Vec::with_capacity(references.len());
    for reference in references {
        match reference.run(footprint, group) {
            Ok(result) => results.push(result),
            Err(VerifyError::GroupNotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    if let (Some(group), true) = (group, results.is_empty()) {
        return Err(VerifyError::GroupNotFound(group.to_string()));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationExt, ValueAnnotation};
    use tracegrade_footprint::FootprintEntry;

    fn value(v: i64) -> ValueAnnotation {
        ValueAnnotation::new(v).unwrap()
    }

    fn footprint() -> MemoryFootprint {
        MemoryFootprint::from_values([
            FootprintEntry::new(1, 1, None),
            FootprintEntry::new(2, 2, None),
        ])
    }

    #[test]
    fn new_applies_limits() {
        let anns: Vec<AnnotationRef> = (0..4)
            .map(|i| AnnotationRef::from(value(i).named("loop").with_limit(2)))
            .chain([AnnotationRef::from(value(9)), AnnotationRef::from(value(8).named("other"))])
            .collect();
        let reference = ReferenceImplementation::new("r", anns);
        assert_eq!(reference.annotations().len(), 4);
    }

    #[test]
    fn run_all_and_group() {
        let a: AnnotationRef = value(1).in_group("g1").into();
        let b: AnnotationRef = value(5).in_group("g2").into();
        let reference = ReferenceImplementation::new("r", [a, b]);

        let all = reference.run(&footprint(), None).unwrap();
        assert!(!all.correct());
        assert_eq!(all.scores(), vec![1, 0]);

        let g1 = reference.run(&footprint(), Some("g1")).unwrap();
        assert!(g1.correct());
        assert_eq!(g1.group(), Some("g1"));
        assert_eq!(g1.results().len(), 1);

        assert_eq!(
            reference.run(&footprint(), Some("nope")).unwrap_err(),
            VerifyError::GroupNotFound("nope".into())
        );
    }

    #[test]
    fn get_by_name() {
        let a: AnnotationRef = value(1).named("x").into();
        let b: AnnotationRef = value(2).named("y").into();
        let c: AnnotationRef = value(3).named("y").into();
        let reference = ReferenceImplementation::new("r", [a.clone(), b.clone(), c.clone()]);

        assert_eq!(reference.get("x").unwrap(), Lookup::One(a));
        assert_eq!(reference.get("y").unwrap(), Lookup::Many(vec![b, c]));
        assert!(matches!(reference.get("z"), Err(VerifyError::AnnotationNotFound(_))));
    }

    fn messaged(v: i64, name: &str, tag: &str) -> AnnotationRef {
        value(v)
            .named(name)
            .with_success_message(format!("ok {tag}"))
            .with_failure_message(format!("bad {tag}"))
            .into()
    }

    #[test]
    fn later_failure_overwrites_success() {
        let reference = ReferenceImplementation::new(
            "r",
            [messaged(1, "n", "first"), messaged(7, "n", "second"), messaged(2, "m", "m")],
        );
        let result = reference.run(&footprint(), None).unwrap();
        assert_eq!(result.messages(), vec!["bad second", "ok m"]);
    }

    #[test]
    fn later_success_keeps_failure() {
        let reference = ReferenceImplementation::new(
            "r",
            [messaged(7, "n", "first"), messaged(1, "n", "second"), messaged(8, "n", "third")],
        );
        let result = reference.run(&footprint(), None).unwrap();
        assert_eq!(result.messages(), vec!["bad third"]);
    }

    #[test]
    fn unnamed_messages_are_all_kept() {
        let unnamed = |v: i64| -> AnnotationRef { value(v).with_success_message("seen").into() };
        let reference = ReferenceImplementation::new("r", [unnamed(1), unnamed(2)]);
        let result = reference.run(&footprint(), None).unwrap();
        assert_eq!(result.messages(), vec!["seen", "seen"]);
    }

    #[test]
    fn check_many_references() {
        let r1 = ReferenceImplementation::new("r1", [AnnotationRef::from(value(1).in_group("g"))]);
        let r2 = ReferenceImplementation::new("r2", [AnnotationRef::from(value(2))]);
        let refs = [r1, r2];

        let all = check_references(&refs, &footprint(), None).unwrap();
        assert_eq!(all.len(), 2);

        let grouped = check_references(&refs, &footprint(), Some("g")).unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].reference().name(), "r1");

        assert!(check_references(&refs, &footprint(), Some("h")).is_err());
    }

    #[test]
    fn dict_forms() {
        let reference = ReferenceImplementation::new("r", [AnnotationRef::from(value(1).named("one"))]);
        let d = reference.to_dict();
        assert_eq!(d["name"], "r");
        assert_eq!(d["annotations"][0]["name"], "one");

        let result = reference.run(&footprint(), None).unwrap().to_dict();
        assert_eq!(result["correct"], true);
        assert_eq!(result["results"][0]["satisfied_at"], 1);
    }
}
