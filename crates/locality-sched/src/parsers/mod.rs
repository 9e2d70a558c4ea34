//! Tools for loading task batches from different text formats.

mod trace_parser;

pub use trace_parser::{parse_trace, parse_trace_records, TraceOptions, TraceRecord};
