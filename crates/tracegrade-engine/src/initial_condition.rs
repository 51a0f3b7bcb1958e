//! Values that are only known once a footprint is checked.
//!
//! An [`InitialCondition`] stands in for an input the traced program
//! received (a random seed, a generated list). Arithmetic on it records a
//! transform instead of computing anything; the transforms run, in order,
//! when the condition is resolved against concrete values.
//!
//! ```rust
//! use tracegrade::InitialCondition;
//! use tracegrade::footprint::Value;
//!
//! let n = InitialCondition::new("n");
//! let expected = (&n + 1) * 2;
//! assert_eq!(expected.supply_value(4)?, Value::Int(10));
//! assert_eq!(expected.to_string(), "((n + 1) * 2)");
//! # Ok::<(), tracegrade::VerifyError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops;
use std::sync::Arc;

use serde_json::json;
use tracegrade_footprint::{MemoryFootprint, Value};

use crate::arithmetic::{self, BinaryOp, UnaryOp};
use crate::error::{VerifyError, VerifyResult};

pub type TransformFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;

/// The other side of an operation on an initial condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Condition(InitialCondition),
}

impl Operand {
    fn resolve(&self, values: Option<&BTreeMap<String, Value>>) -> VerifyResult<Value> {
        match self {
            Operand::Value(value) => Ok(value.clone()),
            Operand::Condition(condition) => match values {
                Some(values) => condition.supply_values(values),
                None => Err(VerifyError::UnknownInitialCondition(condition.name.clone())),
            },
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(value) => write!(f, "{}", value),
            Operand::Condition(condition) => write!(f, "{}", condition),
        }
    }
}

macro_rules! value_operands {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Value(value.into())
                }
            }
        )*
    };
}

value_operands!(bool, i32, i64, f64, &str, String, Value);

impl From<InitialCondition> for Operand {
    fn from(condition: InitialCondition) -> Self {
        Operand::Condition(condition)
    }
}

impl From<&InitialCondition> for Operand {
    fn from(condition: &InitialCondition) -> Self {
        Operand::Condition(condition.clone())
    }
}

#[derive(Clone)]
enum Transform {
    Unary(UnaryOp),
    Binary {
        op: BinaryOp,
        operand: Operand,
        /// The operand is on the left: `operand op condition`.
        reflected: bool,
    },
    PowMod {
        exponent: Operand,
        modulus: Operand,
    },
    Custom {
        name: String,
        func: Arc<TransformFn>,
    },
}

impl Transform {
    fn run(&self, value: Value, values: Option<&BTreeMap<String, Value>>) -> VerifyResult<Value> {
        match self {
            Transform::Unary(op) => arithmetic::unary(*op, &value),
            Transform::Binary {
                op,
                operand,
                reflected,
            } => {
                let other = operand.resolve(values)?;
                if *reflected {
                    arithmetic::binary(*op, &other, &value)
                } else {
                    arithmetic::binary(*op, &value, &other)
                }
            }
            Transform::PowMod { exponent, modulus } => {
                arithmetic::pow_mod(&value, &exponent.resolve(values)?, &modulus.resolve(values)?)
            }
            Transform::Custom { name, func } => func(value).map_err(|message| VerifyError::TransformFailed {
                name: name.clone(),
                message,
            }),
        }
    }

    fn render(&self, inner: String) -> String {
        match self {
            Transform::Unary(UnaryOp::Abs) => format!("abs({inner})"),
            Transform::Unary(op) => format!("{op}{inner}"),
            Transform::Binary {
                op: BinaryOp::DivMod,
                operand,
                reflected,
            } => {
                if *reflected {
                    format!("divmod({operand}, {inner})")
                } else {
                    format!("divmod({inner}, {operand})")
                }
            }
            Transform::Binary {
                op,
                operand,
                reflected: true,
            } => format!("({operand} {op} {inner})"),
            Transform::Binary { op, operand, .. } => format!("({inner} {op} {operand})"),
            Transform::PowMod { exponent, modulus } => format!("pow({inner}, {exponent}, {modulus})"),
            Transform::Custom { name, .. } => format!("{name}({inner})"),
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Transform::Unary(a), Transform::Unary(b)) => a == b,
            (
                Transform::Binary {
                    op: a,
                    operand: x,
                    reflected: r,
                },
                Transform::Binary {
                    op: b,
                    operand: y,
                    reflected: s,
                },
            ) => a == b && x == y && r == s,
            (
                Transform::PowMod {
                    exponent: a,
                    modulus: m,
                },
                Transform::PowMod {
                    exponent: b,
                    modulus: n,
                },
            ) => a == b && m == n,
            (Transform::Custom { name: a, func: f }, Transform::Custom { name: b, func: g }) => {
                a == b && Arc::ptr_eq(f, g)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Unary(op) => f.debug_tuple("Unary").field(op).finish(),
            Transform::Binary {
                op,
                operand,
                reflected,
            } => f
                .debug_struct("Binary")
                .field("op", op)
                .field("operand", operand)
                .field("reflected", reflected)
                .finish(),
            Transform::PowMod { exponent, modulus } => f
                .debug_struct("PowMod")
                .field("exponent", exponent)
                .field("modulus", modulus)
                .finish(),
            Transform::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

/// A named input, resolved against the values a footprint recorded.
///
/// Two conditions are equal when they have the same name and the same
/// transforms. Custom transforms compare by function identity.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialCondition {
    name: String,
    transforms: Vec<Transform>,
}

impl InitialCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transforms: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_transformed(&self) -> bool {
        !self.transforms.is_empty()
    }

    fn then(&self, transform: Transform) -> Self {
        let mut next = self.clone();
        next.transforms.push(transform);
        next
    }

    /// A new condition that also runs `func` on the resolved value.
    pub fn apply<F>(&self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.then(Transform::Custom {
            name: name.into(),
            func: Arc::new(func),
        })
    }

    /// `self op operand`
    pub fn binary(&self, op: BinaryOp, operand: impl Into<Operand>) -> Self {
        self.then(Transform::Binary {
            op,
            operand: operand.into(),
            reflected: false,
        })
    }

    /// `operand op self`
    pub fn binary_reflected(&self, op: BinaryOp, operand: impl Into<Operand>) -> Self {
        self.then(Transform::Binary {
            op,
            operand: operand.into(),
            reflected: true,
        })
    }

    pub fn unary(&self, op: UnaryOp) -> Self {
        self.then(Transform::Unary(op))
    }

    pub fn floor_div(&self, operand: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::FloorDiv, operand)
    }

    pub fn div_mod(&self, operand: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::DivMod, operand)
    }

    pub fn pow(&self, exponent: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::Pow, exponent)
    }

    pub fn pow_mod(&self, exponent: impl Into<Operand>, modulus: impl Into<Operand>) -> Self {
        self.then(Transform::PowMod {
            exponent: exponent.into(),
            modulus: modulus.into(),
        })
    }

    pub fn abs(&self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    pub fn pos(&self) -> Self {
        self.unary(UnaryOp::Pos)
    }

    /// Run the transforms on `value`. Fails if a transform refers to
    /// another condition, which needs [`supply_values`](Self::supply_values).
    pub fn supply_value(&self, value: impl Into<Value>) -> VerifyResult<Value> {
        self.resolve(value.into(), None)
    }

    /// Look up this condition (and any it refers to) in `values`.
    pub fn supply_values(&self, values: &BTreeMap<String, Value>) -> VerifyResult<Value> {
        let seed = values
            .get(&self.name)
            .cloned()
            .ok_or_else(|| VerifyError::UnknownInitialCondition(self.name.clone()))?;
        self.resolve(seed, Some(values))
    }

    pub fn supply_footprint(&self, footprint: &MemoryFootprint) -> VerifyResult<Value> {
        self.supply_values(footprint.initial_conditions())
    }

    fn resolve(&self, seed: Value, values: Option<&BTreeMap<String, Value>>) -> VerifyResult<Value> {
        self.transforms
            .iter()
            .try_fold(seed, |value, transform| transform.run(value, values))
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "expression": self.to_string(),
        })
    }
}

impl fmt::Display for InitialCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .transforms
            .iter()
            .fold(self.name.clone(), |inner, transform| transform.render(inner));
        f.write_str(&rendered)
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

macro_rules! binary_operators {
    ($($trait:ident :: $method:ident => $op:expr),* $(,)?) => {
        $(
            impl<T: Into<Operand>> ops::$trait<T> for InitialCondition {
                type Output = InitialCondition;

                fn $method(self, rhs: T) -> InitialCondition {
                    self.binary($op, rhs)
                }
            }

            impl<T: Into<Operand>> ops::$trait<T> for &InitialCondition {
                type Output = InitialCondition;

                fn $method(self, rhs: T) -> InitialCondition {
                    self.binary($op, rhs)
                }
            }

            impl ops::$trait<InitialCondition> for i64 {
                type Output = InitialCondition;

                fn $method(self, rhs: InitialCondition) -> InitialCondition {
                    rhs.binary_reflected($op, self)
                }
            }

            impl ops::$trait<InitialCondition> for f64 {
                type Output = InitialCondition;

                fn $method(self, rhs: InitialCondition) -> InitialCondition {
                    rhs.binary_reflected($op, self)
                }
            }
        )*
    };
}

binary_operators! {
    Add::add => BinaryOp::Add,
    Sub::sub => BinaryOp::Sub,
    Mul::mul => BinaryOp::Mul,
    Div::div => BinaryOp::Div,
    Rem::rem => BinaryOp::Rem,
    Shl::shl => BinaryOp::Shl,
    Shr::shr => BinaryOp::Shr,
    BitAnd::bitand => BinaryOp::BitAnd,
    BitOr::bitor => BinaryOp::BitOr,
    BitXor::bitxor => BinaryOp::BitXor,
}

impl ops::Neg for InitialCondition {
    type Output = InitialCondition;

    fn neg(self) -> InitialCondition {
        self.unary(UnaryOp::Neg)
    }
}

impl ops::Neg for &InitialCondition {
    type Output = InitialCondition;

    fn neg(self) -> InitialCondition {
        self.unary(UnaryOp::Neg)
    }
}

/// Bitwise complement.
impl ops::Not for InitialCondition {
    type Output = InitialCondition;

    fn not(self) -> InitialCondition {
        self.unary(UnaryOp::Invert)
    }
}
