//! Replay of processor queues through per-core L1 data caches.
//!
//! Every processor gets a set-associative cache with LRU replacement, kept coherent with the other cores by
//! MESI snooping on a shared bus. Cores advance in lockstep: in every round each core issues the next read and
//! the next write of its current task, and moves on to its next task once both lists are drained.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parsers::TraceRecord;
use crate::schedule::Schedule;

fn default_size() -> u64 {
    32768
}
fn default_associativity() -> usize {
    8
}
fn default_line_size() -> u64 {
    64
}
fn default_miss_penalty() -> u64 {
    10
}

/// Geometry and timing of a private L1 data cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity in bytes.
    #[serde(default = "default_size")]
    pub size: u64,
    /// Ways per set.
    #[serde(default = "default_associativity")]
    pub associativity: usize,
    /// Line size in bytes.
    #[serde(default = "default_line_size")]
    pub line_size: u64,
    /// Cycles spent on a miss; a hit costs one cycle.
    #[serde(default = "default_miss_penalty")]
    pub miss_penalty: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            associativity: default_associativity(),
            line_size: default_line_size(),
            miss_penalty: default_miss_penalty(),
        }
    }
}

impl CacheConfig {
    pub fn num_sets(&self) -> u64 {
        self.size / (self.associativity as u64 * self.line_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.associativity == 0 || self.line_size == 0 {
            return Err(Error::InvalidConfig(
                "cache associativity and line size must be positive".to_string(),
            ));
        }
        let set_bytes = self.associativity as u64 * self.line_size;
        if self.size == 0 || self.size % set_bytes != 0 {
            return Err(Error::InvalidConfig(format!(
                "cache size {} is not a positive multiple of associativity * line size = {}",
                self.size, set_bytes
            )));
        }
        Ok(())
    }
}

/// Counters of one core's cache.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct CacheStats {
    pub processor: usize,
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
    /// Valid lines replaced to make room for a missing one.
    pub evictions: u64,
    /// Lines dropped because another core wrote to them.
    pub invalidations: u64,
    /// Snooped bus transactions this cache had to act on.
    pub bus_responses: u64,
    /// Modified lines written back, on eviction or when snooped.
    pub writebacks: u64,
    pub cycles: u64,
}

/// Result of replaying a schedule through the caches.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheReport {
    pub processors: Vec<CacheStats>,
    /// Transactions on the shared bus, write-back flushes included.
    pub bus_transactions: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Cycle count of the slowest core.
    pub max_cycles: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineState {
    Invalid,
    Shared,
    Exclusive,
    Modified,
}

#[derive(Clone, Copy, Debug)]
struct Line {
    tag: u64,
    state: LineState,
    last_use: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BusOp {
    Read,
    ReadExclusive,
}

struct L1Cache {
    sets: Vec<Vec<Line>>,
    clock: u64,
    stats: CacheStats,
}

impl L1Cache {
    fn new(processor: usize, config: &CacheConfig) -> Self {
        let empty = Line {
            tag: 0,
            state: LineState::Invalid,
            last_use: 0,
        };
        Self {
            sets: vec![vec![empty; config.associativity]; config.num_sets() as usize],
            clock: 0,
            stats: CacheStats {
                processor,
                ..Default::default()
            },
        }
    }

    fn find(&self, set: usize, tag: u64) -> Option<usize> {
        self.sets[set]
            .iter()
            .position(|line| line.state != LineState::Invalid && line.tag == tag)
    }

    /// Free way if there is one, otherwise the least recently used.
    fn victim(&self, set: usize) -> usize {
        let lines = &self.sets[set];
        lines
            .iter()
            .position(|line| line.state == LineState::Invalid)
            .unwrap_or_else(|| {
                let mut lru = 0;
                for (way, line) in lines.iter().enumerate() {
                    if line.last_use < lines[lru].last_use {
                        lru = way;
                    }
                }
                lru
            })
    }

    /// Reacts to a transaction of another core. Returns whether the line was present and whether it was flushed.
    fn snoop(&mut self, set: usize, tag: u64, op: BusOp) -> (bool, bool) {
        let Some(way) = self.find(set, tag) else {
            return (false, false);
        };
        let line = &mut self.sets[set][way];
        let flushed = line.state == LineState::Modified;
        match op {
            BusOp::Read => {
                if line.state != LineState::Shared {
                    line.state = LineState::Shared;
                    self.stats.bus_responses += 1;
                }
            }
            BusOp::ReadExclusive => {
                line.state = LineState::Invalid;
                self.stats.bus_responses += 1;
                self.stats.invalidations += 1;
            }
        }
        if flushed {
            self.stats.writebacks += 1;
        }
        (true, flushed)
    }
}

struct CacheSystem {
    caches: Vec<L1Cache>,
    num_sets: u64,
    line_size: u64,
    miss_penalty: u64,
    bus_transactions: u64,
}

impl CacheSystem {
    fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_size;
        ((line % self.num_sets) as usize, line / self.num_sets)
    }

    /// Broadcasts a transaction from `source`. Returns whether another core holds the line.
    fn bus(&mut self, source: usize, set: usize, tag: u64, op: BusOp) -> bool {
        self.bus_transactions += 1;
        let mut shared = false;
        for (core, cache) in self.caches.iter_mut().enumerate() {
            if core == source {
                continue;
            }
            let (present, flushed) = cache.snoop(set, tag, op);
            shared |= present;
            if flushed {
                self.bus_transactions += 1;
            }
        }
        shared
    }

    /// Makes room for a missing line and fetches it with `op`, returning the way it landed in.
    fn fill(&mut self, core: usize, set: usize, tag: u64, op: BusOp) -> usize {
        let cache = &mut self.caches[core];
        cache.stats.misses += 1;
        cache.stats.cycles += self.miss_penalty;
        let way = cache.victim(set);
        let old = cache.sets[set][way];
        if old.state != LineState::Invalid {
            cache.stats.evictions += 1;
            if old.state == LineState::Modified {
                cache.stats.writebacks += 1;
                self.bus_transactions += 1;
            }
        }

        let shared = self.bus(core, set, tag, op);
        let state = match op {
            BusOp::ReadExclusive => LineState::Modified,
            BusOp::Read if shared => LineState::Shared,
            BusOp::Read => LineState::Exclusive,
        };
        let cache = &mut self.caches[core];
        cache.sets[set][way] = Line {
            tag,
            state,
            last_use: cache.clock,
        };
        way
    }

    fn read(&mut self, core: usize, addr: u64) {
        let (set, tag) = self.locate(addr);
        let cache = &mut self.caches[core];
        cache.clock += 1;
        cache.stats.reads += 1;
        if let Some(way) = cache.find(set, tag) {
            cache.stats.hits += 1;
            cache.stats.cycles += 1;
            cache.sets[set][way].last_use = cache.clock;
        } else {
            self.fill(core, set, tag, BusOp::Read);
        }
    }

    fn write(&mut self, core: usize, addr: u64) {
        let (set, tag) = self.locate(addr);
        let cache = &mut self.caches[core];
        cache.clock += 1;
        cache.stats.writes += 1;
        let Some(way) = cache.find(set, tag) else {
            self.fill(core, set, tag, BusOp::ReadExclusive);
            return;
        };
        cache.stats.hits += 1;
        cache.stats.cycles += 1;
        let was_shared = cache.sets[set][way].state == LineState::Shared;
        cache.sets[set][way].state = LineState::Modified;
        cache.sets[set][way].last_use = cache.clock;
        if was_shared {
            self.bus(core, set, tag, BusOp::ReadExclusive);
        }
    }
}

/// Position of a core inside its queue.
#[derive(Default)]
struct Cursor {
    task: usize,
    read: usize,
    write: usize,
}

/// Replays every processor queue of the schedule against the memory traces of its tasks.
///
/// Fails if the cache geometry is invalid, a trace appears twice or a scheduled task has no trace.
pub fn replay(schedule: &Schedule, records: &[TraceRecord], config: &CacheConfig) -> Result<CacheReport> {
    config.validate()?;
    let mut traces = HashMap::with_capacity(records.len());
    for record in records {
        if traces.insert(record.thread_id, record).is_some() {
            return Err(Error::DuplicateTask(record.thread_id));
        }
    }
    let queues = schedule
        .iter()
        .map(|(_, tasks)| {
            tasks
                .iter()
                .map(|id| traces.get(id).copied().ok_or(Error::MissingData(*id)))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut system = CacheSystem {
        caches: schedule.iter().map(|(proc_id, _)| L1Cache::new(proc_id, config)).collect(),
        num_sets: config.num_sets(),
        line_size: config.line_size,
        miss_penalty: config.miss_penalty,
        bus_transactions: 0,
    };
    let mut cursors = queues.iter().map(|_| Cursor::default()).collect::<Vec<_>>();
    let mut rounds = 0u64;
    while cursors.iter().zip(queues.iter()).any(|(c, q)| c.task < q.len()) {
        rounds += 1;
        for (core, (cursor, queue)) in cursors.iter_mut().zip(queues.iter()).enumerate() {
            let Some(record) = queue.get(cursor.task) else {
                continue;
            };
            if let Some(&addr) = record.reads.get(cursor.read) {
                system.read(core, addr);
                cursor.read += 1;
            }
            if let Some(&addr) = record.writes.get(cursor.write) {
                system.write(core, addr);
                cursor.write += 1;
            }
            if cursor.read == record.reads.len() && cursor.write == record.writes.len() {
                *cursor = Cursor {
                    task: cursor.task + 1,
                    ..Default::default()
                };
            }
        }
    }
    debug!(
        "cache replay finished after {} rounds with {} bus transactions",
        rounds, system.bus_transactions
    );

    let processors = system.caches.into_iter().map(|c| c.stats).collect::<Vec<_>>();
    Ok(CacheReport {
        bus_transactions: system.bus_transactions,
        misses: processors.iter().map(|s| s.misses).sum(),
        evictions: processors.iter().map(|s| s.evictions).sum(),
        max_cycles: processors.iter().map(|s| s.cycles).max().unwrap_or(0),
        processors,
    })
}
