use std::sync::Arc;

use serde_json::{json, Map};
use tracegrade_footprint::{MemoryFootprint, Value};
use tracing::warn;

use super::structural::StructuralPattern;
use super::{Annotation, AnnotationMeta, AnnotationRef, Evaluation, Witness};
use crate::debug;
use crate::equivalence::{values_equal, Equivalence, Tolerance};
use crate::error::{VerifyError, VerifyResult};
use crate::initial_condition::InitialCondition;
use crate::invariants::{apply_all, Invariant, InvariantRef};

/// How a value annotation compares values.
///
/// A tolerance and a custom equivalence function are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct ValueOptions {
    pub atol: Option<f64>,
    pub rtol: Option<f64>,
    pub invariants: Vec<InvariantRef>,
    pub equivalence: Option<Equivalence>,
}

impl ValueOptions {
    pub fn atol(mut self, atol: f64) -> Self {
        self.atol = Some(atol);
        self
    }

    pub fn rtol(mut self, rtol: f64) -> Self {
        self.rtol = Some(rtol);
        self
    }

    pub fn invariant(mut self, invariant: impl Invariant + 'static) -> Self {
        self.invariants.push(Arc::new(invariant));
        self
    }

    pub fn equivalence(mut self, equivalence: Equivalence) -> Self {
        self.equivalence = Some(equivalence);
        self
    }

    fn validate(&self) -> VerifyResult<()> {
        if (self.atol.is_some() || self.rtol.is_some()) && self.equivalence.is_some() {
            return Err(VerifyError::ConflictingEquivalence);
        }
        for (name, value) in [("atol", self.atol), ("rtol", self.rtol)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(VerifyError::InvalidTolerance { name, value });
                }
            }
        }
        Ok(())
    }

    fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.atol.unwrap_or(0.0), self.rtol.unwrap_or(0.0))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        let invariants: Vec<&str> = self.invariants.iter().map(|i| i.name()).collect();
        fields.insert("atol".into(), json!(self.atol));
        fields.insert("rtol".into(), json!(self.rtol));
        fields.insert("invariants".into(), json!(invariants));
        fields.insert(
            "equivalence_fn".into(),
            json!(self.equivalence.as_ref().map(Equivalence::name)),
        );
    }
}

/// An accepted value expanded through the invariants, ready to match
/// observed values.
#[derive(Debug, Clone)]
pub(super) struct Matcher {
    accepted: Vec<Value>,
    options: ValueOptions,
}

impl Matcher {
    pub(super) fn new(value: &Value, options: ValueOptions) -> VerifyResult<Self> {
        if !value.is_serializable() {
            return Err(VerifyError::NotSerializable {
                type_name: value.type_name().to_string(),
            });
        }
        options.validate()?;
        Ok(Self {
            accepted: apply_all(&options.invariants, vec![value.clone()]),
            options,
        })
    }

    pub(super) fn matches(&self, observed: &Value) -> VerifyResult<bool> {
        let forms = apply_all(&self.options.invariants, vec![observed.clone()]);
        let tolerance = self.options.tolerance();
        for accepted in &self.accepted {
            for form in &forms {
                if values_equal(accepted, form, tolerance, self.options.equivalence.as_ref())? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        self.options.describe(fields);
    }
}

/// Satisfied by the first footprint entry accepted by `matches`, in
/// footprint order.
fn first_match<F>(footprint: &MemoryFootprint, mut matches: F) -> VerifyResult<Evaluation>
where
    F: FnMut(&Value) -> VerifyResult<bool>,
{
    for entry in footprint {
        if matches(&entry.value)? {
            return Ok(Evaluation::leaf(true)
                .with_witness(Witness::Observed(entry.value.clone()), entry.timestamp));
        }
    }
    Ok(Evaluation::leaf(false))
}

/// What a [`ValueAnnotation`] accepts.
#[derive(Debug, Clone)]
enum Accepted {
    Fixed { initial: Value, matcher: Matcher },
    /// Resolved against the footprint's initial conditions when checked.
    Deferred {
        condition: InitialCondition,
        options: ValueOptions,
    },
    Pattern(StructuralPattern),
}

/// Asserts that a value is observed.
///
/// Satisfied by the first footprint entry that matches, in footprint
/// order; the result carries that entry's value and timestamp. The accepted
/// value is either fixed, an [`InitialCondition`] resolved against the
/// footprint being checked, or a [`StructuralPattern`].
#[derive(Debug, Clone)]
pub struct ValueAnnotation {
    meta: AnnotationMeta,
    accepted: Accepted,
}

impl ValueAnnotation {
    pub fn new(value: impl Into<Value>) -> VerifyResult<Self> {
        Self::with_options(value, ValueOptions::default())
    }

    pub fn with_options(value: impl Into<Value>, options: ValueOptions) -> VerifyResult<Self> {
        let initial = value.into();
        let matcher = Matcher::new(&initial, options)?;
        Ok(Self {
            meta: AnnotationMeta::default(),
            accepted: Accepted::Fixed { initial, matcher },
        })
    }

    /// Accept whatever `condition` resolves to in the checked footprint.
    pub fn from_initial_condition(condition: InitialCondition, options: ValueOptions) -> VerifyResult<Self> {
        options.validate()?;
        Ok(Self {
            meta: AnnotationMeta::default(),
            accepted: Accepted::Deferred { condition, options },
        })
    }

    /// Accept any value matching `pattern`.
    pub fn structural(pattern: StructuralPattern) -> Self {
        Self {
            meta: AnnotationMeta::default(),
            accepted: Accepted::Pattern(pattern),
        }
    }

    /// The fixed accepted value, if there is one.
    pub fn initial_value(&self) -> Option<&Value> {
        match &self.accepted {
            Accepted::Fixed { initial, .. } => Some(initial),
            _ => None,
        }
    }

    /// The fixed accepted value and its invariant forms. Empty for initial
    /// conditions and patterns.
    pub fn accepted_values(&self) -> &[Value] {
        match &self.accepted {
            Accepted::Fixed { matcher, .. } => &matcher.accepted,
            _ => &[],
        }
    }

    pub fn initial_condition(&self) -> Option<&InitialCondition> {
        match &self.accepted {
            Accepted::Deferred { condition, .. } => Some(condition),
            _ => None,
        }
    }

    pub fn pattern(&self) -> Option<&StructuralPattern> {
        match &self.accepted {
            Accepted::Pattern(pattern) => Some(pattern),
            _ => None,
        }
    }

    /// Comparison options; patterns carry theirs per attribute.
    pub fn options(&self) -> Option<&ValueOptions> {
        match &self.accepted {
            Accepted::Fixed { matcher, .. } => Some(&matcher.options),
            Accepted::Deferred { options, .. } => Some(options),
            Accepted::Pattern(_) => None,
        }
    }
}

impl Annotation for ValueAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "value"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        match &self.accepted {
            Accepted::Fixed { matcher, .. } => first_match(footprint, |value| matcher.matches(value)),
            Accepted::Deferred { condition, options } => {
                let resolved = match condition.supply_footprint(footprint) {
                    Ok(resolved) => resolved,
                    Err(err) if debug::is_enabled() => return Err(err),
                    Err(err) => {
                        warn!(condition = %condition, %err, "could not resolve initial condition");
                        return Ok(Evaluation::leaf(false));
                    }
                };
                let matcher = Matcher::new(&resolved, options.clone())?;
                first_match(footprint, |value| matcher.matches(value))
            }
            Accepted::Pattern(pattern) => first_match(footprint, |value| pattern.matches(value)),
        }
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        match &self.accepted {
            Accepted::Fixed { initial, matcher } => {
                fields.insert(
                    "initial_value".into(),
                    serde_json::to_value(initial).unwrap_or_default(),
                );
                matcher.describe(fields);
            }
            Accepted::Deferred { condition, options } => {
                fields.insert("initial_condition".into(), condition.to_json());
                options.describe(fields);
            }
            Accepted::Pattern(pattern) => {
                fields.insert("pattern".into(), json!(pattern.to_string()));
            }
        }
    }
}

/// One attribute of an [`AttributeAnnotation`]: satisfied by the first
/// entry exposing a matching attribute. The witness is the whole entry
/// value, not the attribute.
#[derive(Debug, Clone)]
pub struct AttributeValue {
    meta: AnnotationMeta,
    attribute: String,
    required_type: Option<String>,
    matcher: Matcher,
}

impl AttributeValue {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Annotation for AttributeValue {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "attribute_value"
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        for entry in footprint {
            if let Some(required) = &self.required_type {
                if !entry.value.is_instance(required) {
                    continue;
                }
            }
            let Some(projected) = entry.value.attribute(&self.attribute) else {
                continue;
            };
            if self.matcher.matches(&projected)? {
                return Ok(Evaluation::leaf(true)
                    .with_witness(Witness::Observed(entry.value.clone()), entry.timestamp));
            }
        }
        Ok(Evaluation::leaf(false))
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("attribute".into(), json!(self.attribute));
        fields.insert("required_type".into(), json!(self.required_type));
        self.matcher.describe(fields);
    }
}

/// Asserts that some observed object has attributes matching those of a
/// reference object.
#[derive(Debug, Clone)]
pub struct AttributeAnnotation {
    meta: AnnotationMeta,
    object: Value,
    attributes: Vec<String>,
    enforce_type: bool,
    children: Vec<AnnotationRef>,
}

impl AttributeAnnotation {
    pub fn new<I, S>(object: impl Into<Value>, attributes: I) -> VerifyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_options(object, attributes, ValueOptions::default(), false)
    }

    /// Build with comparison options. With `enforce_type`, only entries
    /// that are instances of the reference object's type are considered.
    pub fn with_options<I, S>(
        object: impl Into<Value>,
        attributes: I,
        options: ValueOptions,
        enforce_type: bool,
    ) -> VerifyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let object = object.into();
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        if attributes.is_empty() {
            return Err(VerifyError::NoAttributes);
        }

        let required_type = enforce_type.then(|| object.type_name().to_string());
        let mut children = Vec::with_capacity(attributes.len());
        for attribute in &attributes {
            let reference = object
                .attribute(attribute)
                .ok_or_else(|| VerifyError::MissingAttribute {
                    type_name: object.type_name().to_string(),
                    attribute: attribute.clone(),
                })?;
            let matcher = Matcher::new(&reference, options.clone())?;
            children.push(AnnotationRef::new(AttributeValue {
                meta: AnnotationMeta::default(),
                attribute: attribute.clone(),
                required_type: required_type.clone(),
                matcher,
            }));
        }

        Ok(Self {
            meta: AnnotationMeta::default(),
            object,
            attributes,
            enforce_type,
            children,
        })
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

impl Annotation for AttributeAnnotation {
    fn meta(&self) -> &AnnotationMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut AnnotationMeta {
        &mut self.meta
    }

    fn kind(&self) -> &'static str {
        "attribute"
    }

    fn children(&self) -> Vec<AnnotationRef> {
        self.children.clone()
    }

    fn evaluate(&self, footprint: &MemoryFootprint) -> VerifyResult<Evaluation> {
        let results = self
            .children
            .iter()
            .map(|child| child.check(footprint))
            .collect::<VerifyResult<Vec<_>>>()?;
        // Only a single object satisfying every attribute is a witness.
        let witness = match results.split_first() {
            Some((first, rest))
                if first.satisfied()
                    && rest
                        .iter()
                        .all(|r| r.satisfied() && r.witness() == first.witness()) =>
            {
                first.witness().cloned()
            }
            _ => None,
        };
        let mut evaluation = Evaluation::composite(None, results);
        evaluation.witness = witness;
        Ok(evaluation)
    }

    fn describe(&self, fields: &mut Map<String, serde_json::Value>) {
        fields.insert("object".into(), serde_json::to_value(&self.object).unwrap_or_default());
        fields.insert("attributes".into(), json!(self.attributes));
        fields.insert("enforce_type".into(), json!(self.enforce_type));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::{ListPermutation, StringCapitalization};
    use tracegrade_footprint::{FootprintEntry, NdArray, Object};

    fn footprint(values: Vec<(Value, i64)>) -> MemoryFootprint {
        MemoryFootprint::from_values(
            values
                .into_iter()
                .map(|(v, ts)| FootprintEntry::new(v, ts, None)),
        )
    }

    fn check(annotation: impl Annotation + 'static, fp: &MemoryFootprint) -> (bool, i64) {
        let res = AnnotationRef::new(annotation).check(fp).unwrap();
        (res.satisfied(), res.satisfied_at())
    }

    #[test]
    fn finds_first_match() {
        let fp = footprint(vec![(1.into(), 1), (2.0.into(), 4), (2.into(), 9)]);
        let res = AnnotationRef::new(ValueAnnotation::new(2).unwrap()).check(&fp).unwrap();
        assert!(res.satisfied());
        assert_eq!(res.satisfied_at(), 4);
        assert_eq!(res.value(), Some(&Value::Float(2.0)));
    }

    #[test]
    fn missing_value() {
        let fp = footprint(vec![(1.into(), 1)]);
        assert_eq!(check(ValueAnnotation::new(7).unwrap(), &fp), (false, -1));
        assert_eq!(check(ValueAnnotation::new(7).unwrap(), &MemoryFootprint::new()), (false, -1));
    }

    #[test]
    fn tolerance_option() {
        let fp = footprint(vec![(1.23456.into(), 2)]);
        assert_eq!(check(ValueAnnotation::new(1.23).unwrap(), &fp), (false, -1));
        let opts = ValueOptions::default().atol(0.01);
        assert_eq!(check(ValueAnnotation::with_options(1.23, opts).unwrap(), &fp), (true, 2));
    }

    #[test]
    fn invariants_apply_to_both_sides() {
        let fp = footprint(vec![(vec![3, 1, 2].into(), 5), ("HeLLo".into(), 6)]);
        let perm = ValueOptions::default().invariant(ListPermutation);
        assert_eq!(check(ValueAnnotation::with_options(vec![2, 3, 1], perm).unwrap(), &fp), (true, 5));

        let caps = ValueOptions::default().invariant(StringCapitalization);
        assert_eq!(check(ValueAnnotation::with_options("hello", caps).unwrap(), &fp), (true, 6));
        assert_eq!(check(ValueAnnotation::new("hello").unwrap(), &fp), (false, -1));
    }

    #[test]
    fn custom_equivalence() {
        let fp = footprint(vec![("apple".into(), 3)]);
        let first_letter = Equivalence::new("first_letter", |a: &Value, b: &Value| {
            Ok(a.as_str().and_then(|s| s.chars().next()) == b.as_str().and_then(|s| s.chars().next()))
        });
        let opts = ValueOptions::default().equivalence(first_letter);
        assert_eq!(check(ValueAnnotation::with_options("avocado", opts).unwrap(), &fp), (true, 3));
    }

    #[test]
    fn construction_errors() {
        let err = ValueAnnotation::new(Value::opaque("generator", "<generator>")).unwrap_err();
        assert!(matches!(err, VerifyError::NotSerializable { .. }));

        let eq = Equivalence::new("always", |_: &Value, _: &Value| Ok(true));
        let opts = ValueOptions::default().atol(0.1).equivalence(eq);
        assert_eq!(ValueAnnotation::with_options(1, opts).unwrap_err(), VerifyError::ConflictingEquivalence);

        let opts = ValueOptions::default().rtol(-1.0);
        assert!(matches!(
            ValueAnnotation::with_options(1, opts).unwrap_err(),
            VerifyError::InvalidTolerance { name: "rtol", .. }
        ));
    }

    #[test]
    fn dict_form() {
        let ann = AnnotationRef::new(
            ValueAnnotation::with_options(vec![1, 2], ValueOptions::default().atol(0.5).invariant(ListPermutation))
                .unwrap(),
        );
        let d = ann.to_dict();
        assert_eq!(d["type"], "value");
        assert_eq!(d["atol"], 0.5);
        assert!(d["rtol"].is_null());
        assert_eq!(d["invariants"][0], "list_permutation");
        assert_eq!(d["initial_value"]["kind"], "list");
        assert!(d.get("initial_condition").is_none());
    }

    #[test]
    fn initial_condition_resolves_per_footprint() {
        let n = InitialCondition::new("n");
        let ann = AnnotationRef::new(
            ValueAnnotation::from_initial_condition(&n * 2, ValueOptions::default()).unwrap(),
        );

        let mut fp = footprint(vec![(3.into(), 1), (8.into(), 5), (6.into(), 9)]);
        fp.set_initial_condition("n", 3);
        let res = ann.check(&fp).unwrap();
        assert!(res.satisfied());
        assert_eq!(res.satisfied_at(), 9);

        fp.set_initial_condition("n", 4);
        assert_eq!(ann.check(&fp).unwrap().satisfied_at(), 5);

        let d = ann.to_dict();
        assert_eq!(d["initial_condition"]["expression"], "(n * 2)");
        assert!(d.get("initial_value").is_none());
    }

    #[test]
    fn initial_condition_options_apply() {
        let x = InitialCondition::new("x");
        let ann = ValueAnnotation::from_initial_condition(
            x.clone() / 3,
            ValueOptions::default().atol(0.01),
        )
        .unwrap();
        let mut fp = footprint(vec![(0.333.into(), 2)]);
        fp.set_initial_condition("x", 1);
        assert_eq!(check(ann, &fp), (true, 2));

        let eq = Equivalence::new("always", |_: &Value, _: &Value| Ok(true));
        assert_eq!(
            ValueAnnotation::from_initial_condition(x, ValueOptions::default().atol(0.1).equivalence(eq))
                .unwrap_err(),
            VerifyError::ConflictingEquivalence
        );
    }

    #[test]
    fn unresolved_initial_condition() {
        let ann = ValueAnnotation::from_initial_condition(InitialCondition::new("seed"), ValueOptions::default())
            .unwrap();
        let fp = footprint(vec![(1.into(), 1)]);

        debug::disable();
        assert_eq!(check(ann.clone(), &fp), (false, -1));

        let _guard = debug::scope();
        let err = AnnotationRef::new(ann).check(&fp).unwrap_err();
        assert_eq!(err, VerifyError::UnknownInitialCondition("seed".into()));
    }

    #[test]
    fn structural_value() {
        let pattern = StructuralPattern::new("Point")
            .unwrap()
            .with_attribute("x", 5)
            .unwrap();
        let fp = footprint(vec![(point(1, 2), 3), (point(5, 6), 7), (point(5, 0), 8)]);
        let ann = AnnotationRef::new(ValueAnnotation::structural(pattern));
        let res = ann.check(&fp).unwrap();
        assert!(res.satisfied());
        assert_eq!(res.satisfied_at(), 7);
        assert_eq!(res.value(), Some(&point(5, 6)));
        assert_eq!(ann.to_dict()["pattern"], "structural.Point(x=5)");

        let missing = ValueAnnotation::structural(StructuralPattern::new("Vector").unwrap());
        assert!(missing.initial_value().is_none());
        assert!(missing.options().is_none());
        assert_eq!(check(missing, &fp), (false, -1));
    }

    fn point(x: i64, y: i64) -> Value {
        Object::new("Point").with_attribute("x", x).with_attribute("y", y).into()
    }

    #[test]
    fn attribute_matches_projection() {
        let fp = footprint(vec![(point(1, 2), 3), (point(5, 6), 7)]);
        let ann = AttributeAnnotation::new(point(5, 0), ["x"]).unwrap();
        let res = AnnotationRef::new(ann).check(&fp).unwrap();
        assert!(res.satisfied());
        assert_eq!(res.satisfied_at(), 7);
        assert_eq!(res.children()[0].value(), Some(&point(5, 6)));
        assert_eq!(res.value(), Some(&point(5, 6)));
    }

    #[test]
    fn attribute_needs_every_attribute() {
        let fp = footprint(vec![(point(1, 2), 3)]);
        assert_eq!(check(AttributeAnnotation::new(point(1, 2), ["x", "y"]).unwrap(), &fp), (true, 3));
        let (satisfied, _) = check(AttributeAnnotation::new(point(1, 9), ["x", "y"]).unwrap(), &fp);
        assert!(!satisfied);
    }

    #[test]
    fn attribute_witness_requires_one_object() {
        let fp = footprint(vec![(point(1, 2), 3), (point(5, 6), 7)]);

        let res = AnnotationRef::new(AttributeAnnotation::new(point(5, 2), ["x", "y"]).unwrap())
            .check(&fp)
            .unwrap();
        assert!(res.satisfied());
        assert_eq!(res.value(), None);

        let res = AnnotationRef::new(AttributeAnnotation::new(point(9, 2), ["x", "y"]).unwrap())
            .check(&fp)
            .unwrap();
        assert!(!res.satisfied());
        assert_eq!(res.children()[1].value(), Some(&point(1, 2)));
        assert_eq!(res.children()[1].satisfied_at(), 3);
        assert_eq!(res.satisfied_at(), -1);
        assert_eq!(res.value(), None);
    }

    #[test]
    fn attribute_on_arrays() {
        let m = NdArray::new(vec![2, 3], vec![0.0; 6]).unwrap();
        let fp = footprint(vec![(NdArray::new(vec![2, 3], vec![1.0; 6]).unwrap().into(), 4)]);
        assert_eq!(check(AttributeAnnotation::new(m, ["shape"]).unwrap(), &fp), (true, 4));
    }

    #[test]
    fn attribute_enforce_type() {
        let other = Object::new("Vector").with_attribute("x", 5).into();
        let fp = footprint(vec![(other, 2)]);
        let loose = AttributeAnnotation::new(point(5, 0), ["x"]).unwrap();
        assert_eq!(check(loose, &fp), (true, 2));
        let strict =
            AttributeAnnotation::with_options(point(5, 0), ["x"], ValueOptions::default(), true).unwrap();
        assert_eq!(check(strict, &fp), (false, -1));
    }

    #[test]
    fn attribute_construction_errors() {
        assert_eq!(
            AttributeAnnotation::new(point(1, 2), Vec::<String>::new()).unwrap_err(),
            VerifyError::NoAttributes
        );
        assert!(matches!(
            AttributeAnnotation::new(point(1, 2), ["z"]).unwrap_err(),
            VerifyError::MissingAttribute { .. }
        ));
    }
}
