//! The dynamic value model for observations.
//!
//! The tracer captures whatever the traced program produced. Rather than an
//! open-ended `Any`, observations are captured into a closed tagged enum so
//! the verification engine can pick a comparison strategy per category
//! without probing types at runtime.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityRecord;
use crate::error::{FootprintError, FootprintResult};
use crate::hash::{ContentHash, ContentHasher};

/// A value observed while tracing a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Array(NdArray),
    Table(Table),
    Object(Object),
    Complexity(ComplexityRecord),
    /// A handle the tracer could not capture structurally (open files,
    /// generators, sockets). Opaque values cannot be serialized and are
    /// only ever compared by type name and textual representation.
    Opaque { type_name: String, repr: String },
}

impl Value {
    pub fn opaque(type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        Value::Opaque {
            type_name: type_name.into(),
            repr: repr.into(),
        }
    }

    /// Runtime type name, following the traced language's conventions.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "dict",
            Value::Array(_) => "ndarray",
            Value::Table(_) => "DataFrame",
            Value::Object(obj) => &obj.class,
            Value::Complexity(_) => "TimeComplexityResult",
            Value::Opaque { type_name, .. } => type_name,
        }
    }

    /// Whether this value is an instance of the named type.
    ///
    /// `bool` values are also `int`s, objects are instances of their bases,
    /// and everything is an `object`.
    pub fn is_instance(&self, type_name: &str) -> bool {
        if type_name == "object" || self.type_name() == type_name {
            return true;
        }
        match self {
            Value::Bool(_) => type_name == "int",
            Value::Object(obj) => obj.bases.iter().any(|b| b == type_name),
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Sized containers. Strings are deliberately excluded.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            Value::List(_) | Value::Tuple(_) | Value::Map(_) | Value::Array(_) | Value::Table(_)
        )
    }

    /// Numeric scalar view (`bool` counts as 0/1).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_complexity(&self) -> Option<&ComplexityRecord> {
        match self {
            Value::Complexity(r) => Some(r),
            _ => None,
        }
    }

    /// Shape of array-like values (arrays and tables).
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            Value::Array(a) => Some(a.shape().to_vec()),
            Value::Table(t) => Some(vec![t.rows().len(), t.columns().len()]),
            _ => None,
        }
    }

    /// Look up an attribute the way attribute access would in the traced
    /// program. Returns `None` if the value does not expose `name`.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.attributes.get(name).cloned(),
            Value::Array(a) => match name {
                "shape" => Some(shape_tuple(a.shape())),
                "T" => Some(Value::Array(a.transpose())),
                "ndim" => Some(Value::Int(a.ndim() as i64)),
                "size" => Some(Value::Int(a.data().len() as i64)),
                _ => None,
            },
            Value::Table(t) => match name {
                "shape" => Some(shape_tuple(&[t.rows().len(), t.columns().len()])),
                "columns" => Some(Value::List(
                    t.columns().iter().cloned().map(Value::Str).collect(),
                )),
                column => t.column(column).map(Value::List),
            },
            Value::Complexity(r) => match name {
                "name" => Some(Value::Str(r.name.clone())),
                "n" => Some(Value::Int(r.n as i64)),
                "start" => Some(Value::Int(r.start)),
                "stop" => Some(Value::Int(r.stop)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Names of the attributes [`Value::attribute`] resolves, in a stable
    /// order.
    pub fn attribute_names(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Value::Object(obj) => return obj.attributes.keys().cloned().collect(),
            Value::Array(_) => &["ndim", "shape", "size", "T"],
            Value::Table(t) => {
                let mut names = vec!["columns".to_string(), "shape".to_string()];
                names.extend(t.columns().iter().cloned());
                return names;
            }
            Value::Complexity(_) => &["n", "name", "start", "stop"],
            _ => &[],
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }

    /// False if this value, or anything nested inside it, is opaque.
    pub fn is_serializable(&self) -> bool {
        match self {
            Value::Opaque { .. } => false,
            Value::List(items) | Value::Tuple(items) => items.iter().all(Value::is_serializable),
            Value::Map(map) => map.values().all(Value::is_serializable),
            Value::Table(t) => t.rows().iter().flatten().all(Value::is_serializable),
            Value::Object(obj) => obj
                .attributes
                .values()
                .chain(obj.elements.iter().flatten())
                .all(Value::is_serializable),
            _ => true,
        }
    }

    /// Stable structural content hash.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, h: &mut ContentHasher) {
        match self {
            Value::None => {
                h.tag(0);
            }
            Value::Bool(b) => {
                h.tag(1).tag(*b as u8);
            }
            Value::Int(i) => {
                h.tag(2).i64(*i);
            }
            Value::Float(f) => {
                h.tag(3).f64(*f);
            }
            Value::Str(s) => {
                h.tag(4).str(s);
            }
            Value::List(items) | Value::Tuple(items) => {
                h.tag(if matches!(self, Value::List(_)) { 5 } else { 6 });
                h.length(items.len());
                for item in items {
                    item.hash_into(h);
                }
            }
            Value::Map(map) => {
                h.tag(7).length(map.len());
                for (k, v) in map {
                    h.str(k);
                    v.hash_into(h);
                }
            }
            Value::Array(a) => {
                h.tag(8).length(a.shape().len());
                for dim in a.shape() {
                    h.u64(*dim as u64);
                }
                for x in a.data() {
                    h.f64(*x);
                }
            }
            Value::Table(t) => {
                h.tag(9).length(t.columns().len());
                for c in t.columns() {
                    h.str(c);
                }
                h.length(t.rows().len());
                for cell in t.rows().iter().flatten() {
                    cell.hash_into(h);
                }
            }
            Value::Object(obj) => {
                h.tag(10).str(&obj.class).length(obj.bases.len());
                for b in &obj.bases {
                    h.str(b);
                }
                h.length(obj.attributes.len());
                for (k, v) in &obj.attributes {
                    h.str(k);
                    v.hash_into(h);
                }
                if let Some(elements) = &obj.elements {
                    h.tag(1).length(elements.len());
                    for e in elements {
                        e.hash_into(h);
                    }
                }
            }
            Value::Complexity(r) => {
                h.tag(11).str(&r.name).u64(r.n).i64(r.start).i64(r.stop);
            }
            Value::Opaque { type_name, repr } => {
                h.tag(12).str(type_name).str(repr);
            }
        }
    }
}

fn shape_tuple(shape: &[usize]) -> Value {
    Value::Tuple(shape.iter().map(|d| Value::Int(*d as i64)).collect())
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                write_seq(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_seq(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Array(a) => write!(f, "array(shape={:?})", a.shape()),
            Value::Table(t) => write!(f, "DataFrame({} rows x {} columns)", t.rows().len(), t.columns().len()),
            Value::Object(obj) => write!(f, "<{} object>", obj.class),
            Value::Complexity(r) => write!(f, "TimeComplexityResult({}, n={})", r.name, r.n),
            Value::Opaque { repr, .. } => write!(f, "{}", repr),
        }
    }
}

/// A dense numeric array stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNdArray")]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Unchecked wire form of [`NdArray`].
#[derive(Deserialize)]
struct RawNdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawNdArray> for NdArray {
    type Error = FootprintError;

    fn try_from(raw: RawNdArray) -> FootprintResult<Self> {
        NdArray::new(raw.shape, raw.data)
    }
}

impl NdArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> FootprintResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(FootprintError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A one-dimensional array.
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// A two-dimensional array from rows; rows must share one length.
    pub fn matrix(rows: Vec<Vec<f64>>) -> FootprintResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let height = rows.len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(FootprintError::RaggedRows {
                row,
                expected: width,
                found: r.len(),
            });
        }
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Self::new(vec![height, width], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Reverse the axes. Arrays with fewer than two dimensions are returned
    /// unchanged.
    pub fn transpose(&self) -> NdArray {
        if self.ndim() < 2 {
            return self.clone();
        }
        let ndim = self.ndim();
        let new_shape: Vec<usize> = self.shape.iter().rev().copied().collect();

        let mut src_strides = vec![1usize; ndim];
        for axis in (0..ndim - 1).rev() {
            src_strides[axis] = src_strides[axis + 1] * self.shape[axis + 1];
        }

        let mut data = Vec::with_capacity(self.data.len());
        let mut index = vec![0usize; ndim];
        for _ in 0..self.data.len() {
            // index is a position in the transposed array; reversed it
            // addresses the source.
            let offset: usize = index
                .iter()
                .rev()
                .zip(&src_strides)
                .map(|(i, stride)| i * stride)
                .sum();
            data.push(self.data[offset]);

            for axis in (0..ndim).rev() {
                index[axis] += 1;
                if index[axis] < new_shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        NdArray {
            shape: new_shape,
            data,
        }
    }
}

/// A tabular value: named columns over rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Unchecked wire form of [`Table`].
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TryFrom<RawTable> for Table {
    type Error = FootprintError;

    fn try_from(raw: RawTable) -> FootprintResult<Self> {
        Table::new(raw.columns, raw.rows)
    }
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> FootprintResult<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(FootprintError::RaggedTable {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx].clone()).collect())
    }
}

/// An instance of a user-defined class, captured by its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub class: String,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Members of a container object, as seen by membership tests. `None`
    /// for objects that do not support them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Value>>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            bases: Vec::new(),
            attributes: BTreeMap::new(),
            elements: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mark the object as a container holding `elements`.
    pub fn with_elements<I, V>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.elements = Some(elements.into_iter().map(Into::into).collect());
        self
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl From<NdArray> for Value {
    fn from(v: NdArray) -> Self {
        Value::Array(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Table(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<ComplexityRecord> for Value {
    fn from(v: ComplexityRecord) -> Self {
        Value::Complexity(v)
    }
}
