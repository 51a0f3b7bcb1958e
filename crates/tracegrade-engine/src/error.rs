use thiserror::Error;

/// Errors from building annotations and running references.
///
/// An unsatisfied annotation is never an error. Errors signal a malformed
/// annotation (raised at construction), a malformed query, or, in debug
/// mode only, a failing custom equivalence function.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifyError {
    #[error("values must be serializable, found an opaque {type_name} value")]
    NotSerializable { type_name: String },

    #[error("cannot specify a tolerance together with a custom equivalence function")]
    ConflictingEquivalence,

    #[error("invalid tolerance {name}={value}: must be finite and non-negative")]
    InvalidTolerance { name: &'static str, value: f64 },

    #[error("{type_name} has no attribute '{attribute}'")]
    MissingAttribute { type_name: String, attribute: String },

    #[error("attribute annotations need at least one attribute name")]
    NoAttributes,

    #[error("'{0}' is not a type")]
    InvalidType(String),

    #[error("'{0}' is not an importable module name")]
    InvalidModule(String),

    #[error("{0} annotations require a name")]
    MissingName(&'static str),

    #[error("'limit' passed without 'name'")]
    LimitWithoutName,

    #[error("xor takes exactly two annotations, got {0}")]
    XorArity(usize),

    #[error("annotation '{0}' is not a collection")]
    NotACollection(String),

    #[error("the specified annotation is not part of this collection")]
    NotAMember,

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("found no annotations with name '{0}'")]
    AnnotationNotFound(String),

    #[error("equivalence function '{name}' failed: {message}")]
    EquivalenceFailed { name: String, message: String },

    #[error("the provided values do not have key '{0}'")]
    UnknownInitialCondition(String),

    #[error("unsupported operand types for {op}: '{left}' and '{right}'")]
    UnsupportedOperands {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("bad operand type for {op}: '{operand}'")]
    UnsupportedOperand { op: &'static str, operand: String },

    #[error("arithmetic error in {op}: {message}")]
    Arithmetic { op: &'static str, message: String },

    #[error("transform '{name}' failed: {message}")]
    TransformFailed { name: String, message: String },

    #[error("lock acquisition failed")]
    LockError,
}

/// Convenience type alias for engine results.
pub type VerifyResult<T> = Result<T, VerifyError>;
