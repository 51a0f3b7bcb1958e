//! Arithmetic over observed values.
//!
//! Numbers follow the traced language's rules: `/` always yields a float,
//! `//` and `%` round toward negative infinity, and integer overflow is an
//! error rather than a wrap. Arrays combine elementwise with scalars or with
//! arrays of the same shape.

use std::fmt;

use serde::Serialize;
use tracegrade_footprint::{NdArray, Value};

use crate::error::{VerifyError, VerifyResult};

/// A binary operator applicable to values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    /// Floor quotient and remainder as a pair.
    DivMod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::DivMod => "divmod",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A unary operator applicable to values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Pos,
    Abs,
    /// Bitwise complement.
    Invert,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Abs => "abs",
            UnaryOp::Invert => "~",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

enum Failure {
    Unsupported,
    Arithmetic(&'static str),
}

/// Apply `op` to `left` and `right`.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> VerifyResult<Value> {
    let outcome = match (Num::of(left), Num::of(right)) {
        (Some(l), Some(r)) => numeric(op, l, r),
        _ => structured(op, left, right),
    };
    outcome.map_err(|failure| match failure {
        Failure::Unsupported => VerifyError::UnsupportedOperands {
            op: op.symbol(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        },
        Failure::Arithmetic(message) => VerifyError::Arithmetic {
            op: op.symbol(),
            message: message.to_string(),
        },
    })
}

/// Apply `op` to `operand`.
pub fn unary(op: UnaryOp, operand: &Value) -> VerifyResult<Value> {
    let unsupported = || VerifyError::UnsupportedOperand {
        op: op.symbol(),
        operand: operand.type_name().to_string(),
    };
    let overflow = || VerifyError::Arithmetic {
        op: op.symbol(),
        message: "integer overflow".to_string(),
    };
    match (op, Num::of(operand)) {
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Abs, Some(Num::Int(i))) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Invert, Some(Num::Int(i))) => Ok(Value::Int(!i)),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Abs, Some(Num::Float(f))) => Ok(Value::Float(f.abs())),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (_, Some(_)) => Err(unsupported()),
        (_, None) => match operand {
            Value::Array(a) => {
                let f: fn(f64) -> f64 = match op {
                    UnaryOp::Neg => |x| -x,
                    UnaryOp::Pos => |x| x,
                    UnaryOp::Abs => f64::abs,
                    UnaryOp::Invert => return Err(unsupported()),
                };
                array(a.shape(), a.data().iter().map(|x| f(*x)).collect())
            }
            _ => Err(unsupported()),
        },
    }
}

/// Three-argument power: `base ** exponent % modulus` over integers.
pub fn pow_mod(base: &Value, exponent: &Value, modulus: &Value) -> VerifyResult<Value> {
    let arithmetic = |message: &str| VerifyError::Arithmetic {
        op: "pow()",
        message: message.to_string(),
    };
    let (b, e, m) = match (Num::of(base), Num::of(exponent), Num::of(modulus)) {
        (Some(Num::Int(b)), Some(Num::Int(e)), Some(Num::Int(m))) => (b, e, m),
        _ => {
            return Err(VerifyError::UnsupportedOperands {
                op: "pow()",
                left: base.type_name().to_string(),
                right: format!("{}, {}", exponent.type_name(), modulus.type_name()),
            })
        }
    };
    if m == 0 {
        return Err(arithmetic("pow() 3rd argument cannot be 0"));
    }
    if e < 0 {
        return Err(arithmetic("negative exponent with a modulus"));
    }
    let modulus = i128::from(m).abs();
    let mut acc: i128 = 1 % modulus;
    let mut square = i128::from(b).rem_euclid(modulus);
    let mut e = e;
    while e > 0 {
        if e & 1 == 1 {
            acc = acc * square % modulus;
        }
        square = square * square % modulus;
        e >>= 1;
    }
    if m < 0 && acc != 0 {
        acc -= modulus;
    }
    i64::try_from(acc)
        .map(Value::Int)
        .map_err(|_| arithmetic("integer overflow"))
}

fn numeric(op: BinaryOp, l: Num, r: Num) -> Result<Value, Failure> {
    match (l, r) {
        (Num::Int(a), Num::Int(b)) => int_op(op, a, b),
        _ => float_op(op, l.as_f64(), r.as_f64()),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, Failure> {
    const OVERFLOW: Failure = Failure::Arithmetic("integer overflow");
    const ZERO: Failure = Failure::Arithmetic("division by zero");
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or(OVERFLOW)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or(OVERFLOW)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or(OVERFLOW)?,
        BinaryOp::Div if b == 0 => return Err(ZERO),
        BinaryOp::Div => return Ok(Value::Float(a as f64 / b as f64)),
        BinaryOp::FloorDiv | BinaryOp::Rem | BinaryOp::DivMod if b == 0 => return Err(ZERO),
        BinaryOp::FloorDiv => floor_div(a, b).ok_or(OVERFLOW)?,
        BinaryOp::Rem => floor_mod(a, b),
        BinaryOp::DivMod => {
            let q = floor_div(a, b).ok_or(OVERFLOW)?;
            return Ok(Value::Tuple(vec![Value::Int(q), Value::Int(floor_mod(a, b))]));
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => a.checked_pow(exp).ok_or(OVERFLOW)?,
            Err(_) if b < 0 => return Ok(Value::Float((a as f64).powf(b as f64))),
            Err(_) => return Err(OVERFLOW),
        },
        BinaryOp::Shl | BinaryOp::Shr if b < 0 => {
            return Err(Failure::Arithmetic("negative shift count"))
        }
        BinaryOp::Shl if a == 0 => 0,
        BinaryOp::Shl if b >= 64 => return Err(OVERFLOW),
        BinaryOp::Shl => i64::try_from(i128::from(a) << b).map_err(|_| OVERFLOW)?,
        BinaryOp::Shr if b >= 64 => {
            if a < 0 {
                -1
            } else {
                0
            }
        }
        BinaryOp::Shr => a >> b,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
    };
    Ok(Value::Int(value))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, Failure> {
    const ZERO: Failure = Failure::Arithmetic("float division by zero");
    let value = match op {
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem | BinaryOp::DivMod if b == 0.0 => {
            return Err(ZERO)
        }
        BinaryOp::DivMod => {
            return Ok(Value::Tuple(vec![
                Value::Float((a / b).floor()),
                Value::Float(float_mod(a, b)),
            ]))
        }
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            return Err(Failure::Unsupported)
        }
        _ => float_elementwise(op, a, b).ok_or(Failure::Unsupported)?,
    };
    Ok(Value::Float(value))
}

/// Float semantics shared by scalars and arrays. Division by zero yields
/// infinities or NaN here; scalars reject it before getting this far.
fn float_elementwise(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Rem => float_mod(a, b),
        BinaryOp::Pow => a.powf(b),
        _ => return None,
    })
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let m = a.wrapping_rem(b);
    if m != 0 && ((m < 0) != (b < 0)) {
        m + b
    } else {
        m
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let m = a % b;
    if m != 0.0 && ((m < 0.0) != (b < 0.0)) {
        m + b
    } else {
        m
    }
}

fn structured(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Failure> {
    match (op, left, right) {
        (_, Value::Array(a), Value::Array(b)) => {
            if a.shape() != b.shape() {
                return Err(Failure::Arithmetic("operands have different shapes"));
            }
            let data = a
                .data()
                .iter()
                .zip(b.data())
                .map(|(x, y)| float_elementwise(op, *x, *y).ok_or(Failure::Unsupported))
                .collect::<Result<Vec<_>, _>>()?;
            array(a.shape(), data).map_err(|_| Failure::Unsupported)
        }
        (_, Value::Array(a), scalar) | (_, scalar, Value::Array(a)) => {
            let s = Num::of(scalar).ok_or(Failure::Unsupported)?.as_f64();
            let array_on_left = matches!(left, Value::Array(_));
            let data = a
                .data()
                .iter()
                .map(|x| {
                    let (l, r) = if array_on_left { (*x, s) } else { (s, *x) };
                    float_elementwise(op, l, r).ok_or(Failure::Unsupported)
                })
                .collect::<Result<Vec<_>, _>>()?;
            array(a.shape(), data).map_err(|_| Failure::Unsupported)
        }
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(*n))))
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => Ok(Value::List(repeat(items, *n))),
        (BinaryOp::Mul, Value::Tuple(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Tuple(items)) => Ok(Value::Tuple(repeat(items, *n))),
        _ => Err(Failure::Unsupported),
    }
}

fn repeat_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn repeat(items: &[Value], n: i64) -> Vec<Value> {
    let count = repeat_count(n);
    let mut out = Vec::with_capacity(items.len().saturating_mul(count));
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn array(shape: &[usize], data: Vec<f64>) -> VerifyResult<Value> {
    NdArray::new(shape.to_vec(), data)
        .map(Value::Array)
        .map_err(|e| VerifyError::Arithmetic {
            op: "array",
            message: e.to_string(),
        })
}
