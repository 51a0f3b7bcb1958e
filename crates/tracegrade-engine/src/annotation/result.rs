use serde::Serialize;
use serde_json::json;
use tracegrade_footprint::Value;

use super::{AnnotationRef, Evaluation};
use crate::complexity::ComplexityClass;

/// What satisfied an annotation, or what was observed instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Witness {
    /// The first matching value from the footprint.
    Observed(Value),
    /// The best-fit complexity class, reported win or lose.
    Complexity(ComplexityClass),
}

/// A diagnostic message from one node of a result tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub text: String,
    pub name: Option<String>,
    pub satisfied: bool,
}

/// The outcome of checking one annotation, with the results of its
/// children.
#[derive(Debug, Clone)]
pub struct AnnotationResult {
    annotation: AnnotationRef,
    own_satisfied: Option<bool>,
    witness: Option<Witness>,
    timestamp: i64,
    children: Vec<AnnotationResult>,
}

impl AnnotationResult {
    pub(crate) fn new(annotation: AnnotationRef, evaluation: Evaluation) -> Self {
        Self {
            annotation,
            own_satisfied: evaluation.satisfied,
            witness: evaluation.witness,
            timestamp: evaluation.timestamp,
            children: evaluation.children,
        }
    }

    pub fn annotation(&self) -> &AnnotationRef {
        &self.annotation
    }

    pub fn name(&self) -> Option<&str> {
        self.annotation.name()
    }

    pub fn group(&self) -> Option<&str> {
        self.annotation.group()
    }

    /// The annotation's own verdict if it gave one, otherwise whether all
    /// children are satisfied.
    pub fn satisfied(&self) -> bool {
        match self.own_satisfied {
            Some(satisfied) => satisfied,
            None => self.children.iter().all(AnnotationResult::satisfied),
        }
    }

    /// Step at which the annotation became satisfied: the latest child
    /// step for composites, the own timestamp for leaves. `-1` means never,
    /// and is what every unsatisfied result reports.
    pub fn satisfied_at(&self) -> i64 {
        if !self.satisfied() {
            return -1;
        }
        self.children
            .iter()
            .map(AnnotationResult::satisfied_at)
            .max()
            .unwrap_or(self.timestamp)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn witness(&self) -> Option<&Witness> {
        self.witness.as_ref()
    }

    /// The satisfying (or, for complexity, observed) value, if any.
    pub fn value(&self) -> Option<&Value> {
        match &self.witness {
            Some(Witness::Observed(v)) => Some(v),
            _ => None,
        }
    }

    pub fn children(&self) -> &[AnnotationResult] {
        &self.children
    }

    pub fn satisfied_children(&self) -> impl Iterator<Item = &AnnotationResult> {
        self.children.iter().filter(|c| c.satisfied())
    }

    /// Messages of the children depth-first, then this node's own.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        self.collect_messages(&mut messages);
        messages
    }

    fn collect_messages(&self, out: &mut Vec<Message>) {
        for child in &self.children {
            child.collect_messages(out);
        }
        let satisfied = self.satisfied();
        let meta = self.annotation.meta();
        let text = if satisfied {
            &meta.success_message
        } else {
            &meta.failure_message
        };
        if let Some(text) = text {
            out.push(Message {
                text: text.clone(),
                name: meta.name.clone(),
                satisfied,
            });
        }
    }

    pub fn to_dict(&self) -> serde_json::Value {
        json!({
            "satisfied": self.satisfied(),
            "satisfied_at": self.satisfied_at(),
            "annotation": self.annotation.to_dict(),
            "children": self.children.iter().map(AnnotationResult::to_dict).collect::<Vec<_>>(),
        })
    }
}
