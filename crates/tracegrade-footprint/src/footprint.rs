//! The memory footprint: an append-only log of observed values.
//!
//! Entries keep insertion order. A content-hash index gives O(1) duplicate
//! detection: re-observing a value widens the existing entry's event rather
//! than appending a second entry. Complexity records bypass deduplication.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::complexity::ComplexityRecord;
use crate::error::{FootprintError, FootprintResult};
use crate::hash::ContentHash;
use crate::value::Value;

/// The trace event that produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Line,
    Return,
    LineAndReturn,
}

impl Event {
    /// Map a tracer event name (`"line"`, `"return"`, ...) to an event.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "line" => Some(Event::Line),
            "return" => Some(Event::Return),
            "line_and_return" => Some(Event::LineAndReturn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Line => "line",
            Event::Return => "return",
            Event::LineAndReturn => "line_and_return",
        }
    }

    /// Combine the event already recorded for a value with a new sighting.
    pub fn widen(existing: Option<Event>, seen: Option<Event>) -> Option<Event> {
        match (existing, seen) {
            (None, seen) => seen,
            (existing, None) => existing,
            (Some(a), Some(b)) if a == b => Some(a),
            _ => Some(Event::LineAndReturn),
        }
    }
}

/// Monotonic step counter driven by the tracer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    value: i64,
}

impl Counter {
    pub fn new(start: i64) -> Self {
        Self { value: start }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn increment(&mut self) {
        self.value += 1;
    }

    pub fn offset(&mut self, by: i64) {
        self.value += by;
    }
}

/// One observation: a value, the step at which it was seen, and the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintEntry {
    pub value: Value,
    pub timestamp: i64,
    pub event: Option<Event>,
}

impl FootprintEntry {
    pub fn new(value: impl Into<Value>, timestamp: i64, event: Option<Event>) -> Self {
        Self {
            value: value.into(),
            timestamp,
            event,
        }
    }
}

/// A traced function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Source location of the callee (usually a filename).
    pub location: String,
    pub name: String,
}

/// The serialized shape of a footprint; the hash index is rebuilt on load.
#[doc(hidden)]
#[derive(Serialize, Deserialize)]
pub struct FootprintRecord {
    counter: Counter,
    entries: Vec<FootprintEntry>,
    calls: Vec<CallRecord>,
    imports: BTreeSet<String>,
    executed_artifact: Option<serde_json::Value>,
    #[serde(default)]
    initial_conditions: BTreeMap<String, Value>,
}

/// The ordered, deduplicated log of values observed during one execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "FootprintRecord", into = "FootprintRecord")]
pub struct MemoryFootprint {
    counter: Counter,
    entries: Vec<FootprintEntry>,
    index: HashMap<ContentHash, usize>,
    calls: Vec<CallRecord>,
    imports: BTreeSet<String>,
    executed_artifact: Option<serde_json::Value>,
    initial_conditions: BTreeMap<String, Value>,
}

impl MemoryFootprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counter(counter: Counter) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }

    /// Build a footprint directly from literal entries.
    ///
    /// Entries are taken as given, duplicates included; the step counter is
    /// advanced to the largest timestamp.
    pub fn from_values(entries: impl IntoIterator<Item = FootprintEntry>) -> Self {
        let mut footprint = Self::new();
        for entry in entries {
            let hash = entry.value.content_hash();
            footprint.index.entry(hash).or_insert(footprint.entries.len());
            footprint.entries.push(entry);
        }
        let steps = footprint.num_steps();
        footprint.offset_counter(steps);
        footprint
    }

    /// Concatenate footprints in sequence.
    ///
    /// Each footprint's timestamps are offset by the step count of all
    /// footprints before it, and a value already seen in an earlier footprint
    /// is dropped (first writer wins). Calls are concatenated and imports
    /// unioned.
    pub fn combine<'a>(footprints: impl IntoIterator<Item = &'a MemoryFootprint>) -> Self {
        let mut combined = Self::new();
        let mut seen: HashSet<ContentHash> = HashSet::new();
        let mut offset = 0i64;
        let mut parts = 0usize;

        for fp in footprints {
            parts += 1;
            combined.calls.extend(fp.calls.iter().cloned());
            combined.imports.extend(fp.imports.iter().cloned());
            if combined.executed_artifact.is_none() {
                combined.executed_artifact = fp.executed_artifact.clone();
            }
            for (name, value) in &fp.initial_conditions {
                combined
                    .initial_conditions
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }

            for entry in &fp.entries {
                let is_record = matches!(entry.value, Value::Complexity(_));
                let hash = entry.value.content_hash();
                if !is_record && !seen.insert(hash) {
                    continue;
                }
                if !is_record {
                    combined.index.insert(hash, combined.entries.len());
                }
                combined.entries.push(FootprintEntry {
                    value: entry.value.clone(),
                    timestamp: entry.timestamp + offset,
                    event: entry.event,
                });
            }
            offset += fp.num_steps().max(0);
        }

        combined.offset_counter(offset);
        debug!(
            parts,
            entries = combined.entries.len(),
            steps = offset,
            "combined memory footprints"
        );
        combined
    }

    /// Record an observed value.
    ///
    /// Without an explicit timestamp the current counter value is used. When
    /// duplicates are not allowed and an equal value is already present, the
    /// existing entry's event is widened and nothing is appended.
    pub fn add_value(
        &mut self,
        value: impl Into<Value>,
        timestamp: Option<i64>,
        event: Option<Event>,
        allow_duplicates: bool,
    ) {
        let value = value.into();
        if !allow_duplicates {
            let hash = value.content_hash();
            if let Some(&idx) = self.index.get(&hash) {
                let existing = &mut self.entries[idx];
                let widened = Event::widen(existing.event, event);
                if widened != existing.event {
                    debug!(index = idx, event = ?widened, "widened event of duplicate value");
                }
                existing.event = widened;
                return;
            }
            self.index.insert(hash, self.entries.len());
        }

        let timestamp = timestamp.unwrap_or_else(|| self.counter.value());
        self.entries.push(FootprintEntry {
            value,
            timestamp,
            event,
        });
    }

    /// Record a complexity measurement. Records are never deduplicated.
    pub fn add_complexity_record(&mut self, record: ComplexityRecord, timestamp: Option<i64>) {
        let timestamp = timestamp.or(Some(record.stop));
        self.add_value(Value::Complexity(record), timestamp, None, true);
    }

    pub fn add_call(&mut self, location: impl Into<String>, name: impl Into<String>) {
        self.calls.push(CallRecord {
            location: location.into(),
            name: name.into(),
        });
    }

    pub fn add_imports<I, S>(&mut self, modules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(modules.into_iter().map(Into::into));
    }

    pub fn get_value(&self, index: usize) -> FootprintResult<&FootprintEntry> {
        self.entries
            .get(index)
            .ok_or(FootprintError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Largest timestamp seen, or -1 for an empty footprint.
    pub fn num_steps(&self) -> i64 {
        self.entries.iter().map(|e| e.timestamp).max().unwrap_or(-1)
    }

    pub fn increment_counter(&mut self) {
        self.counter.increment();
    }

    pub fn offset_counter(&mut self, by: i64) {
        self.counter.offset(by);
    }

    pub fn counter(&self) -> Counter {
        self.counter
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FootprintEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[FootprintEntry] {
        &self.entries
    }

    /// `(value, timestamp)` pairs in insertion order.
    pub fn values(&self) -> impl Iterator<Item = (&Value, i64)> + '_ {
        self.entries.iter().map(|e| (&e.value, e.timestamp))
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }

    pub fn set_executed_artifact(&mut self, artifact: serde_json::Value) {
        self.executed_artifact = Some(artifact);
    }

    pub fn executed_artifact(&self) -> Option<&serde_json::Value> {
        self.executed_artifact.as_ref()
    }

    /// Record the value a submission chose for a named initial condition.
    pub fn set_initial_condition(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.initial_conditions.insert(name.into(), value.into());
    }

    pub fn initial_conditions(&self) -> &BTreeMap<String, Value> {
        &self.initial_conditions
    }

    /// Drop every entry holding an opaque (unserializable) value.
    pub fn filter_out_unserializable(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|e| e.value.is_serializable());
        if self.entries.len() != before {
            debug!(
                dropped = before - self.entries.len(),
                "filtered unserializable values"
            );
            self.rebuild_index();
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            if !matches!(entry.value, Value::Complexity(_)) {
                self.index.entry(entry.value.content_hash()).or_insert(idx);
            }
        }
    }
}

impl PartialEq for MemoryFootprint {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
            && self.calls == other.calls
            && self.imports == other.imports
            && self.executed_artifact == other.executed_artifact
            && self.initial_conditions == other.initial_conditions
    }
}

impl<'a> IntoIterator for &'a MemoryFootprint {
    type Item = &'a FootprintEntry;
    type IntoIter = std::slice::Iter<'a, FootprintEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<FootprintRecord> for MemoryFootprint {
    fn from(record: FootprintRecord) -> Self {
        let mut footprint = Self {
            counter: record.counter,
            entries: record.entries,
            index: HashMap::new(),
            calls: record.calls,
            imports: record.imports,
            executed_artifact: record.executed_artifact,
            initial_conditions: record.initial_conditions,
        };
        footprint.rebuild_index();
        footprint
    }
}

impl From<MemoryFootprint> for FootprintRecord {
    fn from(fp: MemoryFootprint) -> Self {
        Self {
            counter: fp.counter,
            entries: fp.entries,
            calls: fp.calls,
            imports: fp.imports,
            executed_artifact: fp.executed_artifact,
            initial_conditions: fp.initial_conditions,
        }
    }
}
