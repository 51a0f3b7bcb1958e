//! Time-complexity classification.
//!
//! Each class maps an input size to a row of regression features and may
//! transform the step count. A class's score is the residual sum of squares
//! of an ordinary least-squares fit; the lowest score wins.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use serde::{Serialize, Serializer};
use tracegrade_footprint::ComplexityRecord;
use tracing::debug;

use crate::config::ClassifierConfig;

/// Feature row for one input size.
pub type FeatureFn = fn(f64) -> Vec<f64>;
/// Transform applied to step counts before fitting.
pub type StepsFn = fn(f64) -> f64;

/// A caller-defined complexity class.
#[derive(Debug, Clone, Copy)]
pub struct CustomComplexity {
    pub name: &'static str,
    pub features: FeatureFn,
    pub steps: Option<StepsFn>,
}

/// A growth-rate model.
#[derive(Debug, Clone, Copy)]
pub enum ComplexityClass {
    Constant,
    Logarithmic,
    Linear,
    Linearithmic,
    Quadratic,
    Cubic,
    Exponential,
    Custom(CustomComplexity),
}

impl ComplexityClass {
    /// The built-in classes, simplest first. Exponential is only listed
    /// when the config asks for it.
    pub fn builtin(config: &ClassifierConfig) -> Vec<ComplexityClass> {
        let mut classes = vec![
            ComplexityClass::Constant,
            ComplexityClass::Logarithmic,
            ComplexityClass::Linear,
            ComplexityClass::Linearithmic,
            ComplexityClass::Quadratic,
            ComplexityClass::Cubic,
        ];
        if config.include_exponential {
            classes.push(ComplexityClass::Exponential);
        }
        classes
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComplexityClass::Constant => "constant",
            ComplexityClass::Logarithmic => "logarithmic",
            ComplexityClass::Linear => "linear",
            ComplexityClass::Linearithmic => "linearithmic",
            ComplexityClass::Quadratic => "quadratic",
            ComplexityClass::Cubic => "cubic",
            ComplexityClass::Exponential => "exponential",
            ComplexityClass::Custom(c) => c.name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ComplexityClass::Custom(_))
    }

    fn features(&self, n: f64) -> Vec<f64> {
        match self {
            ComplexityClass::Constant => vec![1.0],
            ComplexityClass::Logarithmic => vec![1.0, n.log2()],
            ComplexityClass::Linear | ComplexityClass::Exponential => vec![1.0, n],
            ComplexityClass::Linearithmic => vec![1.0, n * n.log2()],
            ComplexityClass::Quadratic => vec![1.0, n * n],
            ComplexityClass::Cubic => vec![1.0, n * n * n],
            ComplexityClass::Custom(c) => (c.features)(n),
        }
    }

    fn transform_steps(&self, t: f64) -> f64 {
        match self {
            ComplexityClass::Exponential => t.log2(),
            ComplexityClass::Custom(CustomComplexity { steps: Some(f), .. }) => f(t),
            _ => t,
        }
    }

    /// Residual sum of squares of the fit, or infinity if the fit is
    /// degenerate.
    pub fn residual(&self, samples: &BTreeMap<u64, i64>) -> f64 {
        let rows: Vec<Vec<f64>> = samples.keys().map(|&n| self.features(n as f64)).collect();
        let targets: Vec<f64> = samples
            .values()
            .map(|&t| self.transform_steps(t as f64))
            .collect();
        least_squares_residual(rows, targets)
    }
}

impl PartialEq for ComplexityClass {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.is_custom() == other.is_custom()
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for ComplexityClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A disjunction of complexity classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityUnion {
    classes: Vec<ComplexityClass>,
}

impl ComplexityUnion {
    pub fn new(classes: impl IntoIterator<Item = ComplexityClass>) -> Self {
        let mut union = Self { classes: Vec::new() };
        for class in classes {
            union.insert(class);
        }
        union
    }

    fn insert(&mut self, class: ComplexityClass) {
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
    }

    pub fn contains(&self, class: &ComplexityClass) -> bool {
        self.classes.contains(class)
    }

    pub fn classes(&self) -> &[ComplexityClass] {
        &self.classes
    }
}

impl fmt::Display for ComplexityUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.classes.iter().map(ComplexityClass::name).collect();
        write!(f, "{}", names.join(" | "))
    }
}

impl From<ComplexityClass> for ComplexityUnion {
    fn from(class: ComplexityClass) -> Self {
        Self::new([class])
    }
}

impl BitOr for ComplexityClass {
    type Output = ComplexityUnion;

    fn bitor(self, rhs: ComplexityClass) -> ComplexityUnion {
        ComplexityUnion::new([self, rhs])
    }
}

impl BitOr<ComplexityClass> for ComplexityUnion {
    type Output = ComplexityUnion;

    fn bitor(mut self, rhs: ComplexityClass) -> ComplexityUnion {
        self.insert(rhs);
        self
    }
}

impl BitOr<ComplexityUnion> for ComplexityClass {
    type Output = ComplexityUnion;

    fn bitor(self, rhs: ComplexityUnion) -> ComplexityUnion {
        ComplexityUnion::from(self) | rhs
    }
}

impl BitOr for ComplexityUnion {
    type Output = ComplexityUnion;

    fn bitor(mut self, rhs: ComplexityUnion) -> ComplexityUnion {
        for class in rhs.classes {
            self.insert(class);
        }
        self
    }
}

/// Pick the best-fitting class from `candidates`.
///
/// Earlier candidates are preferred: a later one only wins if its residual
/// is lower by more than `config.tie_epsilon`. Returns `None` only when
/// there are no candidates.
pub fn classify(
    samples: &BTreeMap<u64, i64>,
    candidates: &[ComplexityClass],
    config: &ClassifierConfig,
) -> Option<ComplexityClass> {
    let mut best: Option<(ComplexityClass, f64)> = None;
    for class in candidates {
        let residual = class.residual(samples);
        debug!(class = class.name(), residual, "fitted complexity class");
        let better = match best {
            None => true,
            Some((_, best_residual)) => residual < best_residual - config.tie_epsilon,
        };
        if better {
            best = Some((*class, residual));
        }
    }
    best.map(|(class, _)| class)
}

/// Collect `n -> steps` samples. A later record for the same input size
/// replaces an earlier one.
pub fn samples_from_records<'a>(
    records: impl IntoIterator<Item = &'a ComplexityRecord>,
) -> BTreeMap<u64, i64> {
    records.into_iter().map(|r| (r.n, r.steps())).collect()
}

/// Classify complexity records against the built-in classes with the
/// default configuration.
pub fn determine_complexity(records: &[ComplexityRecord]) -> Option<ComplexityClass> {
    let config = ClassifierConfig::default();
    classify(
        &samples_from_records(records),
        &ComplexityClass::builtin(&config),
        &config,
    )
}

/// Residual sum of squares of `min |Ax - b|` via Householder QR.
///
/// Infinite when there are no more samples than columns, when any input is
/// non-finite, or when `A` is rank deficient.
fn least_squares_residual(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> f64 {
    let m = a.len();
    let k = a.first().map_or(0, Vec::len);
    if k == 0 || m <= k || a.iter().any(|row| row.len() != k) {
        return f64::INFINITY;
    }
    if !b.iter().chain(a.iter().flatten()).all(|x| x.is_finite()) {
        return f64::INFINITY;
    }

    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let rank_tol = f64::EPSILON * (m as f64) * scale;

    for col in 0..k {
        let norm = (col..m).map(|r| a[r][col] * a[r][col]).sum::<f64>().sqrt();
        if norm <= rank_tol {
            return f64::INFINITY;
        }
        let alpha = if a[col][col] > 0.0 { -norm } else { norm };

        // v = x - alpha * e1, reflecting rows col..m.
        let mut v: Vec<f64> = (col..m).map(|r| a[r][col]).collect();
        v[0] -= alpha;
        let vnorm2: f64 = v.iter().map(|x| x * x).sum();
        if vnorm2 == 0.0 {
            continue;
        }

        for j in col..k {
            let dot: f64 = v.iter().enumerate().map(|(i, vi)| vi * a[col + i][j]).sum();
            let f = 2.0 * dot / vnorm2;
            for (i, vi) in v.iter().enumerate() {
                a[col + i][j] -= f * vi;
            }
        }
        let dot: f64 = v.iter().enumerate().map(|(i, vi)| vi * b[col + i]).sum();
        let f = 2.0 * dot / vnorm2;
        for (i, vi) in v.iter().enumerate() {
            b[col + i] -= f * vi;
        }
    }

    b[k..].iter().map(|x| x * x).sum()
}
