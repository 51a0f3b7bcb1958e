//! Annotations: declarative assertions over a memory footprint.
//!
//! Concrete annotations implement [`Annotation`] and are shared as
//! [`AnnotationRef`]. Metadata is set with the [`AnnotationExt`] builder
//! methods before an annotation is shared; after that it is immutable
//! (collections excepted, whose membership can change).

mod collection;
mod complexity;
mod imports;
mod relation;
mod result;
mod structural;
mod types;
mod value;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use tracegrade_footprint::MemoryFootprint;
use tracing::debug;

use crate::error::VerifyResult;

pub use collection::Collection;
pub use complexity::TimeComplexity;
pub use imports::{ForbidImport, RequireImport};
pub use relation::{AndAnnotation, BeforeAnnotation, NotAnnotation, OrAnnotation, XorAnnotation};
pub use result::{AnnotationResult, Message, Witness};
pub use structural::StructuralPattern;
pub use types::ForbidType;
pub use value::{AttributeAnnotation, AttributeValue, ValueAnnotation, ValueOptions};

/// Metadata carried by every annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMeta {
    pub name: Option<String>,
    pub group: Option<String>,
    /// Maximum number of live annotations sharing `name`.
    pub limit: Option<usize>,
    pub success_message: Option<String>,
    pub failure_message: Option<String>,
}

/// What an annotation concluded about a footprint, before it is wrapped
/// into an [`AnnotationResult`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// `None` defers to the children.
    pub satisfied: Option<bool>,
    pub witness: Option<Witness>,
    pub timestamp: i64,
    pub children: Vec<AnnotationResult>,
}

impl Evaluation {
    pub fn leaf(satisfied: bool) -> Self {
        Self {
            satisfied: Some(satisfied),
            witness: None,
            timestamp: -1,
            children: Vec::new(),
        }
    }

    pub fn composite(satisfied: Option<bool>, children: Vec<AnnotationResult>) -> Self {
        Self {
            satisfied,
            witness: None,
            timestamp: -1,
            children,
        }
    }

    pub fn with_witness(mut self, witness: Witness, timestamp: i64) -> Self {
        self.witness = Some(witness);
        self.timestamp = timestamp;
        self
    }
}

/// A node in an annotation tree.
pub trait Annotation: fmt::Debug + Send + Sync {
    fn meta(&self) -> &AnnotationMeta;

    fn meta_mut(&mut self) -> &mut AnnotationMeta;

    /// Type tag used in the dictionary form.
    fn kind(&self) -> &'static str;

    fn children(&self) -> Vec<AnnotationRef> {
        Vec::new()
    }

    /// Evaluate against `footprint`. Never mutates the footprint; an
    /// unsatisfied assertion is `Ok`.
    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation>;

    /// Add type-specific fields to the dictionary form.
    fn describe(&self, _fields: &mut Map<String, serde_json::Value>) {}

    fn as_collection(&self) -> Option<&Collection> {
        None
    }
}

/// Chainable metadata setters.
pub trait AnnotationExt: Annotation + Sized {
    fn named(mut self, name: impl Into<String>) -> Self {
        self.meta_mut().name = Some(name.into());
        self
    }

    fn in_group(mut self, group: impl Into<String>) -> Self {
        self.meta_mut().group = Some(group.into());
        self
    }

    fn with_limit(mut self, limit: usize) -> Self {
        self.meta_mut().limit = Some(limit);
        self
    }

    fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.meta_mut().success_message = Some(message.into());
        self
    }

    fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.meta_mut().failure_message = Some(message.into());
        self
    }
}

impl<A: Annotation + Sized> AnnotationExt for A {}

/// A shared annotation. Clones refer to the same node; equality is
/// identity.
#[derive(Clone)]
pub struct AnnotationRef(Arc<dyn Annotation>);

impl AnnotationRef {
    pub fn new(annotation: impl Annotation + 'static) -> Self {
        Self(Arc::new(annotation))
    }

    /// Whether both handles point at the same annotation.
    pub fn same(&self, other: &AnnotationRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub fn name(&self) -> Option<&str> {
        self.meta().name.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.meta().group.as_deref()
    }

    /// Evaluate this annotation against `footprint`.
    pub fn check(&self, footprint: &MemoryFootprint) -> VerifyResult<AnnotationResult> {
        let evaluation = self.0.evaluate(footprint)?;
        let result = AnnotationResult::new(self.clone(), evaluation);
        debug!(
            kind = self.kind(),
            name = self.name().unwrap_or_default(),
            satisfied = result.satisfied(),
            satisfied_at = result.satisfied_at(),
            "checked annotation"
        );
        Ok(result)
    }

    /// JSON-friendly description of the annotation tree.
    pub fn to_dict(&self) -> serde_json::Value {
        let meta = self.meta();
        let mut fields = Map::new();
        fields.insert("name".into(), json!(meta.name));
        fields.insert("group".into(), json!(meta.group));
        fields.insert("limit".into(), json!(meta.limit));
        fields.insert("success_message".into(), json!(meta.success_message));
        fields.insert("failure_message".into(), json!(meta.failure_message));
        fields.insert(
            "children".into(),
            serde_json::Value::Array(self.children().iter().map(AnnotationRef::to_dict).collect()),
        );
        fields.insert("type".into(), json!(self.kind()));
        self.0.describe(&mut fields);
        serde_json::Value::Object(fields)
    }

    pub fn before(&self, other: &AnnotationRef) -> BeforeAnnotation {
        BeforeAnnotation::new([self.clone(), other.clone()])
    }

    pub fn after(&self, other: &AnnotationRef) -> BeforeAnnotation {
        BeforeAnnotation::new([other.clone(), self.clone()])
    }

    pub fn and(&self, other: &AnnotationRef) -> AndAnnotation {
        AndAnnotation::new([self.clone(), other.clone()])
    }

    pub fn or(&self, other: &AnnotationRef) -> OrAnnotation {
        OrAnnotation::new([self.clone(), other.clone()])
    }

    pub fn xor(&self, other: &AnnotationRef) -> XorAnnotation {
        XorAnnotation::pair(self.clone(), other.clone())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(&self) -> NotAnnotation {
        NotAnnotation::new(self.clone())
    }
}

impl Deref for AnnotationRef {
    type Target = dyn Annotation;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for AnnotationRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for AnnotationRef {}

impl fmt::Debug for AnnotationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<A: Annotation + 'static> From<A> for AnnotationRef {
    fn from(annotation: A) -> Self {
        Self::new(annotation)
    }
}
