use std::sync::RwLock;

use serde_json::{json, Map};
use tracegrade_footprint::MemoryFootprint;

use super::relation::{check_all, non_decreasing};
use super::{Annotation, AnnotationMeta, AnnotationRef, AnnotationResult, Evaluation};
use crate::error::{VerifyError, VerifyResult};

/// A group of annotations satisfied when all members are.
///
/// With `enforce_order`, members that were satisfied at a known step must
/// also be satisfied in non-decreasing step order; members without a step
/// are left out of the ordering check. Membership can change after the
/// collection is shared.
#[derive(Debug)]
pub struct Collection {
    meta: AnnotationMeta,
    members: RwLock<Vec<AnnotationRef>>,
    enforce_order: bool,
}

impl Collection {
    pub fn new(members: impl IntoIterator<Item = AnnotationRef>) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            members: RwLock::new(members.into_iter().collect()),
            enforce_order: false,
        }
    }

    pub fn ordered(mut self) -> Self {
        self.enforce_order = true;
        self
    }

    pub fn enforce_order(&self) -> bool {
        self.enforce_order
    }

    pub fn add(&self, annotation: AnnotationRef) -> VerifyResult<()> {
        let mut members = self.members.write().map_err(|_| VerifyError::LockError)?;
        members.push(annotation);
        Ok(())
    }

    /// Remove the first occurrence of `annotation`.
    pub fn remove(&self, annotation: &AnnotationRef) -> VerifyResult<()> {
        let mut members = self.members.write().map_err(|_| VerifyError::LockError)?;
        let idx = members
            .iter()
            .position(|m| m.same(annotation))
            .ok_or(VerifyError::NotAMember)?;
        members.remove(idx);
        Ok(())
    }

    pub fn contains(&self, annotation: &AnnotationRef) -> VerifyResult<bool> {
        let members = self.members.read().map_err(|_| VerifyError::LockError)?;
        Ok(members.iter().any(|m| m.same(annotation)))
    }
}

impl Annotation for Collection {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "collection"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        match self.members.read() {
            Ok(members) => members.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let members = {
            let members = self.members.read().map_err(|_| VerifyError::LockError)?;
            members.clone()
        };
        let results = check_all(&members, footprint)?;

        if self.enforce_order && results.iter().all(AnnotationResult::satisfied) {
            let ordered = non_decreasing(results.iter().filter(|r| r.satisfied_at() != -1));
            return Ok(Evaluation::composite(Some(ordered), results));
        }
        Ok(Evaluation::composite(None, results))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("enforce_order".into(), json!(self.enforce_order));
    }

    fn as_collection(&self) -> Option<&Collection> {
        Some(self)
    }
}
