use serde::{Deserialize, Serialize};

/// A time-complexity measurement recorded by the tracer.
///
/// The tracer snapshots its step counter when a named measurement block is
/// entered (`start`) and left (`stop`); `n` is the input size the block was
/// run against. Several records sharing one `name` form the samples a
/// complexity annotation classifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexityRecord {
    pub name: String,
    pub n: u64,
    pub start: i64,
    pub stop: i64,
}

impl ComplexityRecord {
    pub fn new(name: impl Into<String>, n: u64, start: i64, stop: i64) -> Self {
        Self {
            name: name.into(),
            n,
            start,
            stop,
        }
    }

    /// Number of steps taken inside the measured block.
    pub fn steps(&self) -> i64 {
        self.stop - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_is_stop_minus_start() {
        let r = ComplexityRecord::new("sort", 100, 40, 540);
        assert_eq!(r.steps(), 500);
        assert_eq!(r.name, "sort");
    }
}
