//! Invariants: transforms that expand one value into its equivalent forms.
//!
//! A value annotation runs its accepted value through every invariant in
//! order, and does the same to each observed value before comparing. A
//! match between any accepted form and any observed form counts.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracegrade_footprint::{NdArray, Value};

/// A transform expanding values into additional equivalent forms.
pub trait Invariant: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Expand `values`. Implementations keep the input values and append
    /// the forms they add.
    fn expand(&self, values: Vec<Value>) -> Vec<Value>;
}

pub type InvariantRef = Arc<dyn Invariant>;

/// Run `values` through each invariant in turn.
pub fn apply_all(invariants: &[InvariantRef], values: Vec<Value>) -> Vec<Value> {
    invariants
        .iter()
        .fold(values, |values, invariant| invariant.expand(values))
}

/// Case-insensitive strings: adds the lowercase form of every string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCapitalization;

impl Invariant for StringCapitalization {
    fn name(&self) -> &str {
        "string_capitalization"
    }

    fn expand(&self, values: Vec<Value>) -> Vec<Value> {
        let added: Vec<Value> = values
            .iter()
            .filter_map(|v| match v {
                Value::Str(s) if s.to_lowercase() != *s => Some(Value::Str(s.to_lowercase())),
                _ => None,
            })
            .collect();
        extend(values, added)
    }
}

/// Order-insensitive sequences: adds the sorted form of lists, tuples and
/// one-dimensional arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPermutation;

impl Invariant for ListPermutation {
    fn name(&self) -> &str {
        "list_permutation"
    }

    fn expand(&self, values: Vec<Value>) -> Vec<Value> {
        let added: Vec<Value> = values
            .iter()
            .filter_map(|v| match v {
                Value::List(items) => Some(Value::List(sorted(items))),
                Value::Tuple(items) => Some(Value::Tuple(sorted(items))),
                Value::Array(a) if a.ndim() == 1 => {
                    let mut data = a.data().to_vec();
                    data.sort_by(f64::total_cmp);
                    Some(Value::Array(NdArray::vector(data)))
                }
                _ => None,
            })
            .filter(|sorted| !values.contains(sorted))
            .collect();
        extend(values, added)
    }
}

/// Transpose-insensitive matrices: adds the transpose of 2-D arrays and of
/// rectangular lists of lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixTranspose;

impl Invariant for MatrixTranspose {
    fn name(&self) -> &str {
        "matrix_transpose"
    }

    fn expand(&self, values: Vec<Value>) -> Vec<Value> {
        let added: Vec<Value> = values
            .iter()
            .filter_map(|v| match v {
                Value::Array(a) if a.ndim() == 2 => Some(Value::Array(a.transpose())),
                Value::List(rows) => transpose_rows(rows).map(Value::List),
                _ => None,
            })
            .collect();
        extend(values, added)
    }
}

fn extend(mut values: Vec<Value>, added: Vec<Value>) -> Vec<Value> {
    values.extend(added);
    values
}

fn sorted(items: &[Value]) -> Vec<Value> {
    let mut items = items.to_vec();
    items.sort_by(total_order);
    items
}

/// A total order over values used for sorting: numbers numerically, strings
/// lexicographically, anything else by type name and then rendering.
fn total_order(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => return x.total_cmp(&y),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => a
            .type_name()
            .cmp(b.type_name())
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn transpose_rows(rows: &[Value]) -> Option<Vec<Value>> {
    let rows: Vec<&Vec<Value>> = rows
        .iter()
        .map(|r| match r {
            Value::List(cells) => Some(cells),
            _ => None,
        })
        .collect::<Option<_>>()?;
    let width = rows.first()?.len();
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return None;
    }
    Some(
        (0..width)
            .map(|col| Value::List(rows.iter().map(|r| r[col].clone()).collect()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalization_adds_lowercase() {
        let out = StringCapitalization.expand(vec![Value::from("Hello"), Value::from(3)]);
        assert_eq!(out, vec![Value::from("Hello"), Value::from(3), Value::from("hello")]);

        let out = StringCapitalization.expand(vec![Value::from("quiet")]);
        assert_eq!(out, vec![Value::from("quiet")]);
    }

    #[test]
    fn permutation_adds_sorted_form() {
        let out = ListPermutation.expand(vec![Value::from(vec![3, 1, 2])]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Value::from(vec![1, 2, 3]));

        let out = ListPermutation.expand(vec![Value::from(NdArray::vector(vec![2.0, -1.0]))]);
        assert_eq!(out[1], Value::from(NdArray::vector(vec![-1.0, 2.0])));
    }

    #[test]
    fn permutation_skips_already_sorted() {
        let out = ListPermutation.expand(vec![Value::from(vec![1, 2])]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn mixed_values_sort_numbers_first() {
        let out = sorted(&[Value::from("b"), Value::from(2.5), Value::from("a"), Value::from(1)]);
        assert_eq!(
            out,
            vec![Value::from(1), Value::from(2.5), Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn transpose_arrays_and_nested_lists() {
        let m = NdArray::matrix(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let out = MatrixTranspose.expand(vec![Value::from(m.clone())]);
        assert_eq!(out[1], Value::from(m.transpose()));

        let nested = Value::from(vec![vec![1, 2], vec![3, 4]]);
        let out = MatrixTranspose.expand(vec![nested]);
        assert_eq!(out[1], Value::from(vec![vec![1, 3], vec![2, 4]]));

        let ragged = Value::List(vec![Value::from(vec![1]), Value::from(vec![1, 2])]);
        assert_eq!(MatrixTranspose.expand(vec![ragged]).len(), 1);
    }

    #[test]
    fn chain_applies_in_order() {
        let chain: Vec<InvariantRef> = vec![Arc::new(ListPermutation), Arc::new(MatrixTranspose)];
        let out = apply_all(&chain, vec![Value::from(vec![vec![3, 4], vec![1, 2]])]);
        assert_eq!(
            out,
            vec![
                Value::from(vec![vec![3, 4], vec![1, 2]]),
                Value::from(vec![vec![1, 2], vec![3, 4]]),
                Value::from(vec![vec![3, 1], vec![4, 2]]),
                Value::from(vec![vec![1, 3], vec![2, 4]]),
            ]
        );
    }
}
