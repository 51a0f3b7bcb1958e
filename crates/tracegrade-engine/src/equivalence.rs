//! Value equivalence.
//!
//! Decides whether an accepted value matches an observed one. Each value is
//! sorted into a [`Category`] once, and the comparison strategy is picked
//! from the pair of categories rather than by probing operations and
//! catching failures.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracegrade_footprint::{Table, Value};
use tracing::warn;

use crate::debug;
use crate::error::{VerifyError, VerifyResult};

/// Signature of a caller-supplied comparison. `Err` reports that the
/// comparison itself failed (not that the values differ).
pub type EquivalenceFn = dyn Fn(&Value, &Value) -> Result<bool, String> + Send + Sync;

/// A named custom equivalence function.
#[derive(Clone)]
pub struct Equivalence {
    name: String,
    func: Arc<EquivalenceFn>,
}

impl Equivalence {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, accepted: &Value, observed: &Value) -> Result<bool, String> {
        (self.func)(accepted, observed)
    }
}

impl fmt::Debug for Equivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equivalence").field("name", &self.name).finish()
    }
}

/// Absolute and relative numeric tolerance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    pub fn is_exact(&self) -> bool {
        self.atol == 0.0 && self.rtol == 0.0
    }

    /// `lower <= observed <= upper` around `accepted`.
    pub fn within(&self, accepted: f64, observed: f64) -> bool {
        let slack = self.atol + self.rtol * accepted.abs();
        accepted - slack <= observed && observed <= accepted + slack
    }
}

/// Comparison category of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Null,
    /// `bool`, `int`, `float`.
    Scalar,
    NumericArray,
    Tabular,
    /// Lists and tuples.
    Sequence,
    Mapping,
    /// Strings, objects, complexity records and opaque handles.
    Other,
}

impl Category {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::None => Category::Null,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => Category::Scalar,
            Value::Array(_) => Category::NumericArray,
            Value::Table(_) => Category::Tabular,
            Value::List(_) | Value::Tuple(_) => Category::Sequence,
            Value::Map(_) => Category::Mapping,
            Value::Str(_) | Value::Object(_) | Value::Complexity(_) | Value::Opaque { .. } => {
                Category::Other
            }
        }
    }

    /// Supports the elementwise tolerance operations.
    fn is_numeric(self) -> bool {
        matches!(self, Category::Scalar | Category::NumericArray)
    }
}

/// Whether `observed` matches `accepted`.
///
/// A custom `equivalence`, when given, decides on its own. A failing custom
/// function counts as "not equal" unless debug mode is on, in which case
/// the failure is returned as an error. Mismatched types are never an
/// error.
pub fn values_equal(
    accepted: &Value,
    observed: &Value,
    tolerance: Tolerance,
    equivalence: Option<&Equivalence>,
) -> VerifyResult<bool> {
    if let Some(eq) = equivalence {
        return match eq.call(accepted, observed) {
            Ok(equal) => Ok(equal),
            Err(message) if debug::is_enabled() => Err(VerifyError::EquivalenceFailed {
                name: eq.name().to_string(),
                message,
            }),
            Err(message) => {
                warn!(function = eq.name(), %message, "custom equivalence function failed");
                Ok(false)
            }
        };
    }
    Ok(builtin_equal(accepted, observed, tolerance))
}

fn builtin_equal(accepted: &Value, observed: &Value, tolerance: Tolerance) -> bool {
    if accepted.is_sized() != observed.is_sized() {
        return false;
    }
    if accepted.is_none() || observed.is_none() {
        return accepted.is_none() && observed.is_none();
    }
    match (accepted.shape(), observed.shape()) {
        (Some(a), Some(b)) if a != b => return false,
        (Some(_), None) | (None, Some(_)) => return false,
        _ => {}
    }

    let (ca, co) = (Category::of(accepted), Category::of(observed));
    if ca.is_numeric() {
        return co.is_numeric() && numeric_equal(accepted, observed, tolerance);
    }
    match (accepted, observed) {
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b))
            if all_real(a) && all_real(b) =>
        {
            a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| match (x, y) {
                    (Value::Int(i), Value::Int(j)) if tolerance.is_exact() => i == j,
                    _ => match (x.as_f64(), y.as_f64()) {
                        (Some(x), Some(y)) => tolerance.within(x, y),
                        _ => false,
                    },
                })
        }
        (Value::Table(a), Value::Table(b)) => tables_equal(a, b),
        _ => loose_eq(accepted, observed),
    }
}

/// Elementwise tolerance comparison between numeric scalars and arrays.
/// Shapes have already been checked.
fn numeric_equal(accepted: &Value, observed: &Value, tolerance: Tolerance) -> bool {
    match (accepted, observed) {
        (Value::Int(a), Value::Int(b)) if tolerance.is_exact() => a == b,
        (Value::Array(a), Value::Array(b)) => a
            .data()
            .iter()
            .zip(b.data())
            .all(|(x, y)| tolerance.within(*x, *y)),
        _ => match (accepted.as_f64(), observed.as_f64()) {
            (Some(a), Some(b)) => tolerance.within(a, b),
            _ => false,
        },
    }
}

fn all_real(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|v| matches!(v, Value::Int(_) | Value::Float(_)))
}

/// Cell-by-cell comparison; two NaNs in the same position are equal.
fn tables_equal(a: &Table, b: &Table) -> bool {
    a.columns() == b.columns()
        && a.rows().len() == b.rows().len()
        && a
            .rows()
            .iter()
            .flatten()
            .zip(b.rows().iter().flatten())
            .all(|(x, y)| match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if x.is_nan() && y.is_nan() => true,
                _ => loose_eq(x, y),
            })
}

/// Structural equality where numbers compare by value across `bool`,
/// `int` and `float`, the way equality behaves in the traced program.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|((kx, vx), (ky, vy))| kx == ky && loose_eq(vx, vy))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.class == y.class
                && x.attributes.len() == y.attributes.len()
                && x
                    .attributes
                    .iter()
                    .zip(&y.attributes)
                    .all(|((kx, vx), (ky, vy))| kx == ky && loose_eq(vx, vy))
        }
        (Value::Array(x), Value::Array(y)) => x.shape() == y.shape() && x.data() == y.data(),
        (Value::Table(x), Value::Table(y)) => {
            x.columns() == y.columns()
                && x.rows().len() == y.rows().len()
                && x
                    .rows()
                    .iter()
                    .flatten()
                    .zip(y.rows().iter().flatten())
                    .all(|(a, b)| loose_eq(a, b))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}
