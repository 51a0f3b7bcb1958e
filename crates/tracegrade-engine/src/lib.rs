//! # tracegrade
//!
//! Annotation verification engine. A reference implementation is a set of
//! annotations, declarative assertions about the values a correct program
//! produces. Running a reference against a student's [`MemoryFootprint`]
//! yields a verdict plus diagnostic messages.
//!
//! ## Architecture
//!
//! ```text
//!   MemoryFootprint ──▶ annotation tree (leaves first) ──▶ AnnotationResult tree
//!                                                               │
//!                                  ReferenceImplementation::run ▼
//!                                                        ReferenceResult
//!                                                     (correct, messages)
//! ```
//!
//! - **Leaves**: [`ValueAnnotation`], [`AttributeAnnotation`], [`ForbidType`],
//!   [`RequireImport`], [`ForbidImport`], [`TimeComplexity`]
//! - **Deferred values**: [`InitialCondition`] and [`StructuralPattern`],
//!   both accepted by [`ValueAnnotation`]
//! - **Composites**: [`AndAnnotation`], [`OrAnnotation`], [`XorAnnotation`],
//!   [`NotAnnotation`], [`BeforeAnnotation`], [`Collection`]
//!
//! ## Quick Start
//!
//! ```rust
//! use tracegrade::{AnnotationCollector, AnnotationExt, ValueAnnotation};
//! use tracegrade::footprint::{FootprintEntry, MemoryFootprint};
//!
//! let mut collector = AnnotationCollector::new();
//! let sorted = collector
//!     .track(ValueAnnotation::new(vec![1, 2, 3])?.named("sorted")
//!         .with_success_message("sorted the list")
//!         .with_failure_message("the list was never sorted"))?;
//! let median = collector.track(ValueAnnotation::new(2)?.named("median"))?;
//! collector.track(sorted.before(&median))?;
//! let reference = collector.into_reference("median");
//!
//! let footprint = MemoryFootprint::from_values([
//!     FootprintEntry::new(vec![3, 1, 2], 1, None),
//!     FootprintEntry::new(vec![1, 2, 3], 4, None),
//!     FootprintEntry::new(2, 7, None),
//! ]);
//!
//! let result = reference.run(&footprint, None)?;
//! assert!(result.correct());
//! assert_eq!(result.messages(), vec!["sorted the list"]);
//! # Ok::<(), tracegrade::VerifyError>(())
//! ```

#![deny(unsafe_code)]

pub mod annotation;
pub mod arithmetic;
pub mod collector;
pub mod complexity;
pub mod config;
pub mod debug;
pub mod equivalence;
pub mod error;
pub mod initial_condition;
pub mod invariants;
pub mod reference;
pub mod report;

pub use tracegrade_footprint as footprint;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use annotation::{
    AndAnnotation, Annotation, AnnotationExt, AnnotationMeta, AnnotationRef, AnnotationResult,
    AttributeAnnotation, AttributeValue, BeforeAnnotation, Collection, Evaluation, ForbidImport,
    ForbidType, Message, NotAnnotation, OrAnnotation, RequireImport, StructuralPattern,
    TimeComplexity, ValueAnnotation, ValueOptions, Witness, XorAnnotation,
};
pub use arithmetic::{BinaryOp, UnaryOp};
pub use collector::AnnotationCollector;
pub use complexity::{
    classify, determine_complexity, ComplexityClass, ComplexityUnion, CustomComplexity,
};
pub use config::{ClassifierConfig, ReportFilter, ReportOptions};
pub use equivalence::{values_equal, Equivalence, Tolerance};
pub use error::{VerifyError, VerifyResult};
pub use initial_condition::{InitialCondition, Operand};
pub use invariants::{Invariant, InvariantRef, ListPermutation, MatrixTranspose, StringCapitalization};
pub use reference::{check_references, Lookup, ReferenceImplementation, ReferenceResult};
pub use report::{generate_report, ReferenceReport};
pub use tracegrade_footprint::{MemoryFootprint, Value};
