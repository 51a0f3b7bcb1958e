//! Structural patterns: match an observed value by its type and shape
//! rather than against one concrete reference value.

use std::collections::BTreeMap;
use std::fmt;

use tracegrade_footprint::Value;

use super::imports::is_dotted_identifier;
use super::value::{Matcher, ValueOptions};
use crate::equivalence::loose_eq;
use crate::error::{VerifyError, VerifyResult};

#[derive(Debug, Clone)]
enum AttributeMatch {
    Value { expected: Value, matcher: Matcher },
    Pattern(Box<StructuralPattern>),
}

/// Matches values of a type whose attributes and elements satisfy the
/// recorded constraints.
///
/// Without a module path the runtime type name must equal the class name
/// exactly. With one, any instance of the class (bases included) matches.
#[derive(Debug, Clone)]
pub struct StructuralPattern {
    module: Option<String>,
    class: String,
    named: BTreeMap<String, AttributeMatch>,
    unnamed: Vec<Value>,
    elements: Vec<Value>,
}

impl StructuralPattern {
    /// A pattern for `path`, either a bare class name (`list`) or a
    /// module-qualified one (`pandas.DataFrame`).
    pub fn new(path: impl Into<String>) -> VerifyResult<Self> {
        let path = path.into();
        if !is_dotted_identifier(&path) {
            return Err(VerifyError::InvalidType(path));
        }
        let (module, class) = match path.rsplit_once('.') {
            Some((module, class)) => (Some(module.to_string()), class.to_string()),
            None => (None, path),
        };
        Ok(Self {
            module,
            class,
            named: BTreeMap::new(),
            unnamed: Vec::new(),
            elements: Vec::new(),
        })
    }

    /// Require attribute `name` to equal `value`.
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<Value>) -> VerifyResult<Self> {
        self.with_attribute_options(name, value, ValueOptions::default())
    }

    /// Require attribute `name` to match `value` under `options`, the way a
    /// value annotation would.
    pub fn with_attribute_options(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        options: ValueOptions,
    ) -> VerifyResult<Self> {
        let expected = value.into();
        let matcher = Matcher::new(&expected, options)?;
        self.named
            .insert(name.into(), AttributeMatch::Value { expected, matcher });
        Ok(self)
    }

    /// Require attribute `name` to match a nested pattern.
    pub fn with_attribute_pattern(mut self, name: impl Into<String>, pattern: StructuralPattern) -> Self {
        self.named
            .insert(name.into(), AttributeMatch::Pattern(Box::new(pattern)));
        self
    }

    /// Require some attribute, whatever its name, to equal `value`.
    pub fn with_unnamed(mut self, value: impl Into<Value>) -> Self {
        self.unnamed.push(value.into());
        self
    }

    /// Require every one of `elements` to be contained in the value.
    /// Replaces elements set earlier.
    pub fn containing<I, V>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.elements = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn matches(&self, value: &Value) -> VerifyResult<bool> {
        if !self.type_matches(value) {
            return Ok(false);
        }
        for (name, expected) in &self.named {
            let Some(actual) = value.attribute(name) else {
                return Ok(false);
            };
            let matched = match expected {
                AttributeMatch::Value { matcher, .. } => matcher.matches(&actual)?,
                AttributeMatch::Pattern(pattern) => pattern.matches(&actual)?,
            };
            if !matched {
                return Ok(false);
            }
        }
        if !self.unnamed.is_empty() {
            let attributes: Vec<Value> = value
                .attribute_names()
                .iter()
                .filter_map(|name| value.attribute(name))
                .collect();
            if !self
                .unnamed
                .iter()
                .all(|expected| attributes.iter().any(|actual| loose_eq(actual, expected)))
            {
                return Ok(false);
            }
        }
        Ok(self.elements.iter().all(|element| contains(value, element)))
    }

    fn type_matches(&self, value: &Value) -> bool {
        match &self.module {
            None => value.type_name() == self.class,
            Some(module) => {
                value.is_instance(&format!("{}.{}", module, self.class)) || value.is_instance(&self.class)
            }
        }
    }
}

/// Membership as the `in` operator would test it. Values that are not
/// containers contain nothing.
fn contains(container: &Value, element: &Value) -> bool {
    match container {
        Value::List(items) | Value::Tuple(items) => items.iter().any(|item| loose_eq(item, element)),
        Value::Map(map) => element.as_str().is_some_and(|key| map.contains_key(key)),
        Value::Str(s) => element.as_str().is_some_and(|needle| s.contains(needle)),
        Value::Array(a) => element.as_f64().is_some_and(|x| a.data().contains(&x)),
        Value::Table(t) => element
            .as_str()
            .is_some_and(|column| t.columns().iter().any(|c| c == column)),
        Value::Object(obj) => obj
            .elements
            .as_ref()
            .is_some_and(|items| items.iter().any(|item| loose_eq(item, element))),
        _ => false,
    }
}

impl fmt::Display for StructuralPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structural.")?;
        if let Some(module) = &self.module {
            write!(f, "{}.", module)?;
        }
        write!(f, "{}(", self.class)?;
        let mut first = true;
        for value in &self.unnamed {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", value)?;
        }
        for (name, expected) in &self.named {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            match expected {
                AttributeMatch::Value { expected, .. } => write!(f, "{}={}", name, expected)?,
                AttributeMatch::Pattern(pattern) => write!(f, "{}={}", name, pattern)?,
            }
        }
        write!(f, ")")?;
        if !self.elements.is_empty() {
            write!(f, ".contains_(")?;
            for (i, element) in self.elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", element)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::ListPermutation;
    use tracegrade_footprint::{NdArray, Object, Table};

    fn attrs(pairs: &[(&str, Value)]) -> Value {
        pairs
            .iter()
            .fold(Object::new("AttrContainer"), |obj, (k, v)| obj.with_attribute(*k, v.clone()))
            .into()
    }

    fn pattern(path: &str) -> StructuralPattern {
        StructuralPattern::new(path).unwrap()
    }

    #[test]
    fn named_attributes() {
        let p = pattern("AttrContainer")
            .with_attribute("a", 1)
            .unwrap()
            .with_attribute("b", "x")
            .unwrap();
        assert!(p.matches(&attrs(&[("a", 1.into()), ("b", "x".into())])).unwrap());
        // extra attributes are fine
        assert!(p
            .matches(&attrs(&[("a", 1.into()), ("b", "x".into()), ("c", 3.into())]))
            .unwrap());
        assert!(!p.matches(&attrs(&[("a", 2.into()), ("b", "x".into())])).unwrap());
        assert!(!p.matches(&attrs(&[("a", 1.into())])).unwrap());
    }

    #[test]
    fn attribute_options() {
        let opts = ValueOptions::default().invariant(ListPermutation);
        let p = pattern("AttrContainer")
            .with_attribute_options("items", vec![1, 2, 3], opts)
            .unwrap();
        assert!(p.matches(&attrs(&[("items", vec![3, 1, 2].into())])).unwrap());

        let p = pattern("AttrContainer")
            .with_attribute_options("x", 1.0, ValueOptions::default().atol(0.1))
            .unwrap();
        assert!(p.matches(&attrs(&[("x", 1.05.into())])).unwrap());
    }

    #[test]
    fn class_name_rules() {
        let p = pattern("Point");
        let point: Value = Object::new("Point").into();
        let sub: Value = Object::new("Point3").with_base("Point").into();
        assert!(p.matches(&point).unwrap());
        assert!(!p.matches(&sub).unwrap());
        assert!(!p.matches(&Value::from(1)).unwrap());

        let qualified = pattern("geometry.Point");
        assert_eq!(qualified.module(), Some("geometry"));
        assert_eq!(qualified.class(), "Point");
        assert!(qualified.matches(&point).unwrap());
        assert!(qualified.matches(&sub).unwrap());

        assert!(matches!(
            StructuralPattern::new("list[int]"),
            Err(VerifyError::InvalidType(_))
        ));
    }

    #[test]
    fn nested_patterns() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.into(), 2.into()], vec![3.into(), 4.into()]],
        )
        .unwrap();
        let shape = pattern("tuple").containing([2]);
        let p = pattern("pandas.DataFrame").with_attribute_pattern("shape", shape);
        assert!(p.matches(&table.clone().into()).unwrap());

        let wide = pattern("pandas.DataFrame").with_attribute_pattern("shape", pattern("tuple").containing([5]));
        assert!(!wide.matches(&table.clone().into()).unwrap());
        // a nested pattern needs the attribute to exist
        let p = pattern("pandas.DataFrame").with_attribute_pattern("index", pattern("list"));
        assert!(!p.matches(&table.into()).unwrap());
    }

    #[test]
    fn unnamed_attributes() {
        let p = pattern("AttrContainer").with_unnamed(1).with_unnamed("x");
        assert!(p.matches(&attrs(&[("a", 1.into()), ("b", "x".into())])).unwrap());
        assert!(p.matches(&attrs(&[("q", "x".into()), ("r", 1.0.into())])).unwrap());
        assert!(!p.matches(&attrs(&[("a", 1.into())])).unwrap());

        let arr = NdArray::new(vec![2, 2], vec![0.0; 4]).unwrap();
        let p = pattern("numpy.ndarray").with_unnamed(2);
        assert!(p.matches(&arr.into()).unwrap());
    }

    #[test]
    fn containment() {
        let p = pattern("list").containing([1, 3]);
        assert!(p.matches(&vec![1, 2, 3].into()).unwrap());
        assert!(!p.matches(&vec![1, 2].into()).unwrap());

        let container: Value = Object::new("Container").with_elements([1, 2, 3]).into();
        assert!(pattern("Container").containing([2]).matches(&container).unwrap());
        assert!(!pattern("Container").containing([4]).matches(&container).unwrap());
        // an object that is not a container contains nothing
        let plain: Value = Object::new("Container").into();
        assert!(!pattern("Container").containing([1]).matches(&plain).unwrap());
        assert!(pattern("Container").matches(&plain).unwrap());

        assert!(pattern("str").containing(["ell"]).matches(&"hello".into()).unwrap());
        assert!(!pattern("int").containing([1]).matches(&1.into()).unwrap());

        let later = pattern("list").containing([9]).containing([1]);
        assert!(later.matches(&vec![1].into()).unwrap());
    }

    #[test]
    fn display() {
        let p = pattern("mod.Cls")
            .with_attribute("a", 1)
            .unwrap()
            .with_attribute("b", 2)
            .unwrap();
        assert_eq!(p.to_string(), "structural.mod.Cls(a=1, b=2)");
        let p = pattern("list").with_unnamed(1).containing([2, 3]);
        assert_eq!(p.to_string(), "structural.list(1).contains_(2, 3)");
    }
}
