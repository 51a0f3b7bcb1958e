//! # tracegrade-footprint
//!
//! The observation model shared between a tracer and the verification
//! engine. A tracer runs a submission, and each value the program produces
//! is appended to a [`MemoryFootprint`] together with a monotonic step
//! timestamp and the trace [`Event`] that exposed it. The engine only ever
//! reads footprints.
//!
//! ```rust
//! use tracegrade_footprint::{Event, MemoryFootprint, Value};
//!
//! let mut fp = MemoryFootprint::new();
//! fp.increment_counter();
//! fp.add_value(vec![1, 2, 3], None, Some(Event::Line), false);
//! fp.increment_counter();
//! fp.add_value(vec![1, 2, 3], None, Some(Event::Return), false);
//!
//! assert_eq!(fp.len(), 1);
//! assert_eq!(fp.get_value(0).unwrap().event, Some(Event::LineAndReturn));
//! assert_eq!(fp.get_value(0).unwrap().value, Value::from(vec![1, 2, 3]));
//! ```

#![deny(unsafe_code)]

pub mod complexity;
pub mod error;
pub mod footprint;
pub mod hash;
pub mod value;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use complexity::ComplexityRecord;
pub use error::{FootprintError, FootprintResult};
pub use footprint::{CallRecord, Counter, Event, FootprintEntry, MemoryFootprint};
pub use hash::{ContentHash, ContentHasher};
pub use value::{NdArray, Object, Table, Value};
