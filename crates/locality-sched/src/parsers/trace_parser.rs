use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{DataId, Task, TaskBatch, TaskId};

const EOF_MARKER: &str = "#eof";

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Parses a bracketed, comma-separated list of data ids, returning it together with the rest of the input.
fn parse_list(s: &str, line: usize) -> Result<(Vec<DataId>, &str)> {
    let s = s.trim_start();
    let s = s
        .strip_prefix('[')
        .ok_or_else(|| parse_error(line, format!("expected '[' at {s:?}")))?;
    let close = s.find(']').ok_or_else(|| parse_error(line, "unterminated data list"))?;
    let items = s[..close]
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<DataId>()
                .map_err(|_| parse_error(line, format!("bad data id {item:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((items, &s[close + 1..]))
}

/// One thread of a memory trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub thread_id: TaskId,
    pub instr_count: u64,
    /// Addresses read, in program order.
    pub reads: Vec<DataId>,
    /// Addresses written, in program order.
    pub writes: Vec<DataId>,
}

impl TraceRecord {
    /// Task with the instruction count as cost and the reads followed by the writes as data.
    pub fn to_task(&self) -> Task {
        let data = self.reads.iter().chain(self.writes.iter()).copied().collect();
        Task::new(self.thread_id, self.instr_count as f64, data)
    }
}

fn parse_record(record: &str, line: usize) -> Result<TraceRecord> {
    let body = record
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| parse_error(line, "record must be enclosed in parentheses"))?;

    let mut header = body.splitn(3, ',');
    let mut next_number = |what: &'static str| {
        header
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| parse_error(line, format!("missing {what}")))
    };
    let id = next_number("thread id")?;
    let id = id
        .parse::<TaskId>()
        .map_err(|_| parse_error(line, format!("bad thread id {id:?}")))?;
    let count = next_number("instruction count")?;
    let count = count
        .parse::<u64>()
        .map_err(|_| parse_error(line, format!("bad instruction count {count:?}")))?;
    let rest = header.next().ok_or_else(|| parse_error(line, "missing data lists"))?;

    let (reads, rest) = parse_list(rest, line)?;
    let rest = rest
        .trim_start()
        .strip_prefix(',')
        .ok_or_else(|| parse_error(line, "missing write list"))?;
    let (writes, rest) = parse_list(rest, line)?;
    if !rest.trim().is_empty() {
        return Err(parse_error(line, format!("unexpected trailing input {rest:?}")));
    }

    Ok(TraceRecord {
        thread_id: id,
        instr_count: count,
        reads,
        writes,
    })
}

/// Parses memory trace records.
///
/// Each line holds one thread: `(thread_id, instruction_count, [reads...], [writes...])`. Parsing stops at a
/// `#eof` line, blank lines are skipped. Records are returned in file order.
pub fn parse_trace_records(text: &str) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let record = line.trim();
        if record == EOF_MARKER {
            break;
        }
        if record.is_empty() {
            continue;
        }
        records.push(parse_record(record, line_no)?);
    }
    Ok(records)
}

/// Parses memory trace text into tasks in file order, see [`parse_trace_records`] and [`TraceRecord::to_task`].
pub fn parse_trace(text: &str) -> Result<Vec<Task>> {
    Ok(parse_trace_records(text)?.iter().map(|r| r.to_task()).collect())
}

fn yes() -> bool {
    true
}

/// How trace records are turned into the scheduling queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceOptions {
    /// Skip the last record, which describes the main thread.
    #[serde(default = "yes")]
    pub drop_main_thread: bool,
    /// Order the queue by decreasing instruction count.
    #[serde(default = "yes")]
    pub longest_first: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            drop_main_thread: true,
            longest_first: true,
        }
    }
}

impl TaskBatch {
    /// Reads a batch from memory trace text in file order, see [`parse_trace`].
    pub fn from_trace(text: &str) -> Result<Self> {
        TaskBatch::new(parse_trace(text)?)
    }

    /// Builds the scheduling queue from trace records.
    ///
    /// The queue starts from the last record and goes back to the first one. With `drop_main_thread` the last
    /// record is left out. With `longest_first` the queue is then stably sorted by decreasing cost, so threads
    /// with equal instruction counts stay in reverse file order.
    pub fn from_records(records: &[TraceRecord], options: &TraceOptions) -> Result<Self> {
        let skip = usize::from(options.drop_main_thread && !records.is_empty());
        let batch = TaskBatch::new(records.iter().rev().skip(skip).map(|r| r.to_task()).collect())?;
        Ok(if options.longest_first {
            batch.sorted_by_cost_desc()
        } else {
            batch
        })
    }
}
