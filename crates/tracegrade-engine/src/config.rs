//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default preference margin for simpler complexity classes.
pub const DEFAULT_TIE_EPSILON: f64 = 1e-6;

/// Configuration for the complexity classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A later candidate only replaces the current best fit if its residual
    /// is lower by more than this margin.
    pub tie_epsilon: f64,
    /// Consider exponential growth. Off by default: fitting `log2(steps)`
    /// is numerically unstable on small step counts.
    pub include_exponential: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: DEFAULT_TIE_EPSILON,
            include_exponential: false,
        }
    }
}

/// Which reference results a report shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFilter {
    #[default]
    All,
    Satisfied,
    Unsatisfied,
}

impl ReportFilter {
    pub fn admits(&self, satisfied: bool) -> bool {
        match self {
            ReportFilter::All => true,
            ReportFilter::Satisfied => satisfied,
            ReportFilter::Unsatisfied => !satisfied,
        }
    }
}

/// Options for [`generate_report`](crate::report::generate_report).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    pub filter: ReportFilter,
}

impl ReportOptions {
    pub fn only(filter: ReportFilter) -> Self {
        Self { filter }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_defaults() {
        let cfg = ClassifierConfig::default();
        assert_eq!(cfg.tie_epsilon, 1e-6);
        assert!(!cfg.include_exponential);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: ClassifierConfig = serde_json::from_str(r#"{"include_exponential": true}"#).unwrap();
        assert!(cfg.include_exponential);
        assert_eq!(cfg.tie_epsilon, DEFAULT_TIE_EPSILON);

        let opts: ReportOptions = serde_json::from_str(r#"{"filter": "unsatisfied"}"#).unwrap();
        assert_eq!(opts.filter, ReportFilter::Unsatisfied);
        let opts: ReportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.filter, ReportFilter::All);
    }

    #[test]
    fn filter_admits() {
        assert!(ReportFilter::All.admits(false));
        assert!(ReportFilter::Satisfied.admits(true));
        assert!(!ReportFilter::Satisfied.admits(false));
        assert!(ReportFilter::Unsatisfied.admits(false));
    }
}
