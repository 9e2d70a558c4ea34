//! Batch runs of schedulers over memory traces.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use locality_sched::cache::{replay, CacheConfig, CacheReport};
use locality_sched::parsers::{parse_trace_records, TraceOptions, TraceRecord};
use locality_sched::report::RunReport;
use locality_sched::scheduler::{Scheduler, SchedulerParams};
use locality_sched::{Result, SchedulerConfig, TaskBatch};

pub type SchedulerResolver = fn(&SchedulerParams, &SchedulerConfig) -> Result<Box<dyn Scheduler>>;

/// Contains result of one run.
#[derive(Serialize, Debug)]
pub struct RunResult {
    pub trace: String,
    pub scheduler: String,
    pub makespan: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_makespan: Option<f64>,
    pub total_blocks: usize,
    pub assignments: Vec<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheReport>,
}

#[derive(Deserialize)]
struct ExperimentConfig {
    traces: Vec<PathBuf>,
    schedulers: Vec<String>,
    #[serde(flatten)]
    scheduler_config: SchedulerConfig,
    #[serde(flatten)]
    trace_options: TraceOptions,
    #[serde(default)]
    reorder: bool,
    /// Replay every schedule through L1 caches with this geometry.
    #[serde(default)]
    cache: Option<CacheConfig>,
}

struct Run {
    trace_name: String,
    batch: TaskBatch,
    records: Arc<Vec<TraceRecord>>,
    scheduler: SchedulerParams,
}

pub struct Experiment {
    runs: Vec<Run>,
    scheduler_config: SchedulerConfig,
    reorder: bool,
    cache: Option<CacheConfig>,
    scheduler_resolver: SchedulerResolver,
}

impl Experiment {
    /// Load config from a file.
    pub fn load(config_path: &Path, scheduler_resolver: SchedulerResolver) -> Self {
        let config: ExperimentConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|f| serde_yaml::from_str(&f).ok())
            .unwrap_or_else(|| panic!("Can't read config from file {}", config_path.display()));
        if let Err(e) = config.scheduler_config.validate() {
            panic!("Bad scheduler settings in {}: {e}", config_path.display());
        }
        if let Some(Err(e)) = config.cache.as_ref().map(|c| c.validate()) {
            panic!("Bad cache settings in {}: {e}", config_path.display());
        }

        let traces = get_all_files(&config.traces).into_iter().map(|path| {
            let text = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Can't read trace {}: {e}", path.display()));
            let records = parse_trace_records(&text)
                .unwrap_or_else(|e| panic!("Can't parse trace {}: {e}", path.display()));
            let batch = TaskBatch::from_records(&records, &config.trace_options)
                .unwrap_or_else(|e| panic!("Bad task batch in {}: {e}", path.display()));
            if batch.is_empty() {
                warn!("Trace {} has no tasks", path.display());
            }
            (path.display().to_string(), batch, Arc::new(records))
        });

        let schedulers = config
            .schedulers
            .iter()
            .map(|s| SchedulerParams::from_str(s).unwrap_or_else(|| panic!("Can't parse scheduler params from {s}")))
            .inspect(|params| {
                if let Err(e) = scheduler_resolver(params, &config.scheduler_config) {
                    panic!("Can't resolve scheduler {params}: {e}")
                }
            })
            .collect::<Vec<_>>();

        let runs = traces
            .cartesian_product(schedulers)
            .map(|((trace_name, batch, records), scheduler)| Run {
                trace_name,
                batch,
                records,
                scheduler,
            })
            .collect::<Vec<_>>();

        Self {
            runs,
            scheduler_config: config.scheduler_config,
            reorder: config.reorder,
            cache: config.cache,
            scheduler_resolver,
        }
    }

    /// Run all experiments.
    pub fn run(self, num_threads: usize) -> Vec<RunResult> {
        let total_runs = self.runs.len();
        info!("Running {} experiments on {} threads", total_runs, num_threads);

        let finished_runs = Arc::new(AtomicUsize::new(0));
        let result = Arc::new(Mutex::new(Vec::new()));

        let pool = ThreadPool::new(num_threads);
        let start_time = Instant::now();
        for run in self.runs.into_iter() {
            let finished_runs = finished_runs.clone();
            let result = result.clone();
            let base_config = self.scheduler_config.clone();
            let resolver = self.scheduler_resolver;
            let reorder = self.reorder;
            let cache_config = self.cache.clone();
            pool.execute(move || {
                // parameters were checked on load
                let config = run.scheduler.apply_to(&base_config).unwrap();
                let scheduler = resolver(&run.scheduler, &base_config).unwrap();

                let mut schedule = scheduler.get_schedule(&run.batch);
                if reorder {
                    schedule.order_by_locality(&run.batch).unwrap();
                }
                let report = RunReport::new(&schedule, &run.batch, &config.block_mapper()).unwrap();
                let cache = cache_config.map(|c| replay(&schedule, &run.records, &c).unwrap());

                result.lock().unwrap().push(RunResult {
                    trace: run.trace_name,
                    scheduler: format!("{}", run.scheduler),
                    makespan: report.makespan,
                    expected_makespan: report.expected_makespan,
                    total_blocks: report.total_blocks,
                    assignments: schedule.iter().map(|(_, tasks)| tasks.to_vec()).collect(),
                    cache,
                });

                finished_runs.fetch_add(1, Ordering::SeqCst);
                let finished = finished_runs.load(Ordering::SeqCst);

                let elapsed = start_time.elapsed();
                let remaining =
                    Duration::from_secs_f64(elapsed.as_secs_f64() / finished as f64 * (total_runs - finished) as f64);
                print!("\r{}", " ".repeat(70));
                print!(
                    "\rFinished {}/{} [{}%] runs in {:.2?}, remaining time: {:.2?}",
                    finished,
                    total_runs,
                    (finished as f64 * 100. / total_runs as f64).round() as i32,
                    elapsed,
                    remaining
                );
                std::io::stdout().flush().unwrap();
            });
        }

        pool.join();

        print!("\r{}", " ".repeat(70));
        println!("\rFinished {} runs in {:.2?}", total_runs, start_time.elapsed());

        let mut result = Arc::try_unwrap(result).unwrap().into_inner().unwrap();
        result.sort_by(|a, b| a.makespan.total_cmp(&b.makespan));
        result
    }
}

fn get_all_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut result = Vec::new();
    for path in paths.iter() {
        if path.is_dir() {
            let mut entries = std::fs::read_dir(path)
                .unwrap_or_else(|e| panic!("Can't list directory {}: {e}", path.display()))
                .map(|s| s.unwrap().path())
                .collect::<Vec<_>>();
            entries.sort();
            result.extend(get_all_files(&entries));
        } else {
            result.push(path.clone());
        }
    }
    result
}
