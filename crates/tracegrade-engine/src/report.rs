//! Text reports over reference results.

use std::fmt;

use crate::config::ReportOptions;
use crate::reference::ReferenceResult;

/// One reference's section of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceReport {
    pub name: String,
    pub satisfied: bool,
    pub messages: Vec<String>,
}

impl ReferenceReport {
    pub fn from_result(result: &ReferenceResult) -> Self {
        Self {
            name: result.reference().name().to_string(),
            satisfied: result.correct(),
            messages: result.messages(),
        }
    }
}

impl fmt::Display for ReferenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let satisfied = if self.satisfied { "True" } else { "False" };
        writeln!(f, "REFERENCE: {}", self.name)?;
        writeln!(f, "SATISFIED: {}", satisfied)?;
        writeln!(f, "MESSAGES:")?;
        for message in &self.messages {
            writeln!(f, "  - {}", message)?;
        }
        Ok(())
    }
}

/// Render `results`, one section per reference separated by blank lines.
///
/// If the filter would leave nothing to show, every result is shown.
pub fn generate_report(results: &[ReferenceResult], options: &ReportOptions) -> String {
    let reports: Vec<ReferenceReport> = results.iter().map(ReferenceReport::from_result).collect();
    let mut shown: Vec<&ReferenceReport> = reports
        .iter()
        .filter(|r| options.filter.admits(r.satisfied))
        .collect();
    if shown.is_empty() {
        shown = reports.iter().collect();
    }
    shown
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationExt, AnnotationRef, ValueAnnotation};
    use crate::config::ReportFilter;
    use crate::reference::ReferenceImplementation;
    use tracegrade_footprint::{FootprintEntry, MemoryFootprint};

    fn result(name: &str, v: i64) -> ReferenceResult {
        let fp = MemoryFootprint::from_values([FootprintEntry::new(1, 1, None)]);
        let ann = ValueAnnotation::new(v)
            .unwrap()
            .named("check")
            .with_success_message("found it")
            .with_failure_message("did not find it");
        ReferenceImplementation::new(name, [AnnotationRef::from(ann)])
            .run(&fp, None)
            .unwrap()
    }

    #[test]
    fn single_reference() {
        let report = generate_report(&[result("good", 1)], &ReportOptions::default());
        assert_eq!(
            report,
            "REFERENCE: good\nSATISFIED: True\nMESSAGES:\n  - found it"
        );
    }

    #[test]
    fn sections_separated_by_blank_line() {
        let report = generate_report(&[result("good", 1), result("bad", 2)], &ReportOptions::default());
        assert!(report.contains("  - found it\n\nREFERENCE: bad\nSATISFIED: False\n"));
    }

    #[test]
    fn filters() {
        let results = [result("good", 1), result("bad", 2)];
        let only_bad = generate_report(&results, &ReportOptions::only(ReportFilter::Unsatisfied));
        assert!(!only_bad.contains("REFERENCE: good"));
        assert!(only_bad.contains("REFERENCE: bad"));

        let only_good = generate_report(&results, &ReportOptions::only(ReportFilter::Satisfied));
        assert!(only_good.contains("REFERENCE: good"));
        assert!(!only_good.contains("REFERENCE: bad"));
    }

    #[test]
    fn empty_filter_falls_back_to_everything() {
        let results = [result("good", 1)];
        let report = generate_report(&results, &ReportOptions::only(ReportFilter::Unsatisfied));
        assert!(report.contains("REFERENCE: good"));
    }
}
