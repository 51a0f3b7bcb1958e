//! Boolean and ordering combinators.

use tracegrade_footprint::MemoryFootprint;

use super::{Annotation, AnnotationMeta, AnnotationRef, AnnotationResult, Evaluation};
use crate::error::{VerifyError, VerifyResult};

pub(crate) fn check_all(
    children: &[AnnotationRef],
    footprint: &MemoryFootprint,
) -> VerifyResult<Vec<AnnotationResult>> {
    children.iter().map(|child| child.check(footprint)).collect()
}

/// Whether `satisfied_at` never decreases along `results`.
pub(crate) fn non_decreasing<'a>(results: impl IntoIterator<Item = &'a AnnotationResult>) -> bool {
    let steps: Vec<i64> = results.into_iter().map(AnnotationResult::satisfied_at).collect();
    steps.windows(2).all(|w| w[0] <= w[1])
}

/// Satisfied when every child is satisfied and their satisfying steps are
/// in non-decreasing order.
#[derive(Debug, Clone)]
pub struct BeforeAnnotation {
    meta: AnnotationMeta,
    children: Vec<AnnotationRef>,
}

impl BeforeAnnotation {
    pub fn new(children: impl IntoIterator<Item = AnnotationRef>) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            children: children.into_iter().collect(),
        }
    }
}

impl Annotation for BeforeAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "before"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        self.children.clone()
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let results = check_all(&self.children, footprint)?;
        let satisfied = results.iter().all(AnnotationResult::satisfied) && non_decreasing(&results);
        Ok(Evaluation::composite(Some(satisfied), results))
    }
}

/// Satisfied when every child is.
#[derive(Debug, Clone)]
pub struct AndAnnotation {
    meta: AnnotationMeta,
    children: Vec<AnnotationRef>,
}

impl AndAnnotation {
    pub fn new(children: impl IntoIterator<Item = AnnotationRef>) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            children: children.into_iter().collect(),
        }
    }
}

impl Annotation for AndAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "and"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        self.children.clone()
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let results = check_all(&self.children, footprint)?;
        let satisfied = results.iter().all(AnnotationResult::satisfied);
        Ok(Evaluation::composite(Some(satisfied), results))
    }
}

/// Satisfied when any child is.
#[derive(Debug, Clone)]
pub struct OrAnnotation {
    meta: AnnotationMeta,
    children: Vec<AnnotationRef>,
}

impl OrAnnotation {
    pub fn new(children: impl IntoIterator<Item = AnnotationRef>) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            children: children.into_iter().collect(),
        }
    }
}

impl Annotation for OrAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "or"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        self.children.clone()
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let results = check_all(&self.children, footprint)?;
        let satisfied = results.iter().any(AnnotationResult::satisfied);
        Ok(Evaluation::composite(Some(satisfied), results))
    }
}

/// Satisfied when exactly one of its two children is.
#[derive(Debug, Clone)]
pub struct XorAnnotation {
    meta: AnnotationMeta,
    left: AnnotationRef,
    right: AnnotationRef,
}

impl XorAnnotation {
    /// Build from a list of children, which must hold exactly two.
    pub fn new(children: impl IntoIterator<Item = AnnotationRef>) -> VerifyResult<Self> {
        let children: Vec<AnnotationRef> = children.into_iter().collect();
        match <[AnnotationRef; 2]>::try_from(children) {
            Ok([left, right]) => Ok(Self::pair(left, right)),
            Err(children) => Err(VerifyError::XorArity(children.len())),
        }
    }

    pub fn pair(left: AnnotationRef, right: AnnotationRef) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            left,
            right,
        }
    }
}

impl Annotation for XorAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "xor"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        vec![self.left.clone(), self.right.clone()]
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let left = self.left.check(footprint)?;
        let right = self.right.check(footprint)?;
        let satisfied = left.satisfied() ^ right.satisfied();
        Ok(Evaluation::composite(Some(satisfied), vec![left, right]))
    }
}

/// Satisfied when its child is not.
#[derive(Debug, Clone)]
pub struct NotAnnotation {
    meta: AnnotationMeta,
    child: AnnotationRef,
}

impl NotAnnotation {
    pub fn new(child: AnnotationRef) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            child,
        }
    }
}

impl Annotation for NotAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "not"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        vec![self.child.clone()]
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let result = self.child.check(footprint)?;
        let satisfied = !result.satisfied();
        Ok(Evaluation::composite(Some(satisfied), vec![result]))
    }
}
