//! The annotation collector.
//!
//! A reference is assembled by passing each new annotation through a
//! collector. The collector keeps the annotations that are live at the top
//! level, in construction order: composing annotations moves the children
//! out of the top level and into their parent.

use std::collections::HashMap;

use tracing::debug;

use crate::annotation::{Annotation, AnnotationRef};
use crate::error::{VerifyError, VerifyResult};
use crate::reference::ReferenceImplementation;

#[derive(Debug, Default)]
pub struct AnnotationCollector {
    tracked: Vec<AnnotationRef>,
    /// Live instances per annotation name.
    live: HashMap<String, usize>,
    constructed: usize,
}

impl AnnotationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share `annotation` and register it as a top-level annotation.
    ///
    /// Unnamed annotations are named `Annotation <n>` after their position
    /// in construction order. A named annotation whose name already has
    /// `limit` live instances is returned but not registered.
    pub fn track<A: Annotation + 'static>(&mut self, mut annotation: A) -> VerifyResult<AnnotationRef> {
        self.constructed += 1;
        let meta = annotation.meta_mut();
        if meta.name.is_none() {
            if meta.limit.is_some() {
                return Err(VerifyError::LimitWithoutName);
            }
            meta.name = Some(format!("Annotation {}", self.constructed));
        }
        let annotation = AnnotationRef::new(annotation);

        if let Some(name) = annotation.name() {
            let live = self.live.entry(name.to_string()).or_default();
            if let Some(limit) = annotation.meta().limit {
                if *live >= limit {
                    debug!(name, limit, "annotation over its limit, not tracked");
                    return Ok(annotation);
                }
            }
            *live += 1;
        }

        for child in annotation.children() {
            self.release(&child);
        }
        self.tracked.push(annotation.clone());
        Ok(annotation)
    }

    /// Remove `annotation` from the top level. Returns whether it was
    /// there.
    pub fn release(&mut self, annotation: &AnnotationRef) -> bool {
        let before = self.tracked.len();
        self.tracked.retain(|t| !t.same(annotation));
        self.tracked.len() != before
    }

    /// Add `member` to a collection, moving it out of the top level.
    pub fn add_to_collection(
        &mut self,
        collection: &AnnotationRef,
        member: &AnnotationRef,
    ) -> VerifyResult<()> {
        let target = collection.as_collection().ok_or_else(|| {
            VerifyError::NotACollection(collection.name().unwrap_or(collection.kind()).to_string())
        })?;
        target.add(member.clone())?;
        self.release(member);
        Ok(())
    }

    pub fn tracked(&self) -> &[AnnotationRef] {
        &self.tracked
    }

    pub fn into_reference(self, name: impl Into<String>) -> ReferenceImplementation {
        ReferenceImplementation::new(name, self.tracked)
    }
}
