use std::collections::HashSet;

use itertools::Itertools;
use rand::prelude::*;
use rand_pcg::Pcg64;

use locality_sched::block::BlockMapper;
use locality_sched::cache::{replay, CacheConfig};
use locality_sched::config::SchedulerConfig;
use locality_sched::package::Bin;
use locality_sched::parsers::{parse_trace_records, TraceOptions};
use locality_sched::report::RunReport;
use locality_sched::schedule::Schedule;
use locality_sched::scheduler::{default_scheduler_resolver, Scheduler, SchedulerParams};
use locality_sched::schedulers::clustering::cluster;
use locality_sched::schedulers::dmda::DmdaScheduler;
use locality_sched::schedulers::greedy::GreedyScheduler;
use locality_sched::schedulers::hfp::HfpScheduler;
use locality_sched::schedulers::hfp_heter::{balance_by_load_with, HfpHeterScheduler, LOAD_SLACK};
use locality_sched::task::{Task, TaskBatch, TaskId};

const SCHEDULERS: [&str; 4] = ["Greedy", "Dmda", "Hfp", "HfpHeter"];

fn gen_batch(rng: &mut Pcg64, num_tasks: usize, address_space: u64) -> TaskBatch {
    let tasks = (0..num_tasks)
        .map(|id| {
            let num_items = rng.gen_range(0..12);
            let base = rng.gen_range(0..address_space);
            let data = (0..num_items)
                .map(|_| base + rng.gen_range(0..address_space / 4 + 1))
                .collect();
            Task::new(id, rng.gen_range(1..1000) as f64, data)
        })
        .collect();
    TaskBatch::new(tasks).unwrap()
}

fn gen_config(rng: &mut Pcg64) -> SchedulerConfig {
    SchedulerConfig::new(rng.gen_range(1..9), 1 << rng.gen_range(0..7))
        .with_max_mem(if rng.gen_range(0..4) == 0 {
            None
        } else {
            Some(rng.gen_range(1..40))
        })
        .with_fetch_cost(rng.gen_range(0.0..500.0))
}

fn resolve(name: &str, config: &SchedulerConfig) -> Box<dyn Scheduler> {
    default_scheduler_resolver(&SchedulerParams::from_str(name).unwrap(), config).unwrap()
}

#[test]
fn every_task_scheduled_exactly_once() {
    let mut rng = Pcg64::seed_from_u64(1);
    for _ in 0..50 {
        let num_tasks = rng.gen_range(0..80);
        let batch = gen_batch(&mut rng, num_tasks, 4096);
        let config = gen_config(&mut rng);
        for name in SCHEDULERS {
            let schedule = resolve(name, &config).get_schedule(&batch);
            assert_eq!(schedule.num_proc(), config.num_proc, "{name} with {config:?}");
            assert!(schedule.covers_exactly(&batch), "{name} with {config:?}: {schedule:?}");
        }
    }
}

#[test]
fn schedules_are_deterministic() {
    let mut rng = Pcg64::seed_from_u64(2);
    let batch = gen_batch(&mut rng, 60, 1024);
    let config = SchedulerConfig::new(5, 16).with_max_mem(Some(12));
    for name in SCHEDULERS {
        let first = resolve(name, &config).get_schedule(&batch);
        let second = resolve(name, &config).get_schedule(&batch.clone());
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn greedy_available_times_never_decrease() {
    let mut rng = Pcg64::seed_from_u64(3);
    for _ in 0..20 {
        let batch = gen_batch(&mut rng, 50, 2048);
        let config = gen_config(&mut rng);
        let scheduler = GreedyScheduler::new(config.clone()).unwrap();

        let mut last = vec![0.; config.num_proc];
        let processors = scheduler.plan(&batch, |_, processors| {
            for p in processors {
                assert!(p.available_time() >= last[p.id]);
                last[p.id] = p.available_time();
            }
        });

        let longest = processors.iter().map(|p| p.available_time()).fold(0., f64::max);
        assert_eq!(scheduler.get_schedule(&batch).expected_makespan(), Some(longest));
        assert_eq!(
            longest,
            RunReport::new(
                &scheduler.get_schedule(&batch),
                &batch,
                &BlockMapper::new(config.cache_block_size)
            )
            .unwrap()
            .makespan
        );
    }
}

#[test]
fn dmda_residency_only_grows() {
    let mut rng = Pcg64::seed_from_u64(4);
    for _ in 0..20 {
        let batch = gen_batch(&mut rng, 50, 512);
        let config = gen_config(&mut rng);
        let scheduler = DmdaScheduler::new(config.clone()).unwrap();
        let mapper = BlockMapper::new(config.cache_block_size);

        let mut resident = vec![HashSet::new(); config.num_proc];
        let mut available = vec![0.; config.num_proc];
        let processors = scheduler.plan(&batch, |task, processors| {
            let owner = processors.iter().find(|p| p.tasks().last() == Some(&task.id)).unwrap();
            for &d in task.data.iter() {
                assert!(owner.is_resident(mapper.block_of(d)));
            }
            for p in processors {
                assert!(resident[p.id].is_subset(p.resident_blocks()));
                assert!(p.available_time() >= available[p.id]);
                resident[p.id] = p.resident_blocks().clone();
                available[p.id] = p.available_time();
            }
        });

        let longest = processors.iter().map(|p| p.available_time()).fold(0., f64::max);
        assert_eq!(scheduler.get_schedule(&batch).expected_makespan(), Some(longest));
    }
}

#[test]
fn hfp_respects_count_bound() {
    let mut rng = Pcg64::seed_from_u64(5);
    for _ in 0..50 {
        let num_tasks = rng.gen_range(1..100);
        let batch = gen_batch(&mut rng, num_tasks, 4096);
        let config = gen_config(&mut rng);
        let schedule = HfpScheduler::new(config.clone()).unwrap().get_schedule(&batch);
        let bound = batch.len().div_ceil(config.num_proc);
        for (proc_id, tasks) in schedule.iter() {
            assert!(tasks.len() <= bound, "processor {proc_id} has {} > {bound} tasks", tasks.len());
        }
    }
}

#[test]
fn hfp_heter_finalizes_only_blocked_bins() {
    let mut rng = Pcg64::seed_from_u64(6);
    for _ in 0..50 {
        let num_tasks = rng.gen_range(1..100);
        let batch = gen_batch(&mut rng, num_tasks, 4096);
        let config = gen_config(&mut rng);
        let mapper = BlockMapper::new(config.cache_block_size);
        let packages = cluster(&batch, &mapper, config.num_proc, config.max_mem);
        let heaviest = packages.iter().map(|p| p.load()).fold(0., f64::max);
        let bound = batch.total_cost() / config.num_proc as f64 * LOAD_SLACK;

        let mut finalized: Vec<Vec<TaskId>> = Vec::new();
        let bins = balance_by_load_with(
            packages.into_iter().map(Bin::from).collect(),
            &batch,
            config.num_proc,
            |transfer| {
                assert!(transfer.budget_left >= 0.);
                if let Some(to_load) = transfer.to_load {
                    let received: f64 = transfer.moved.iter().map(|(_, runtime)| runtime).sum();
                    assert!(to_load + received <= bound + 1e-6, "receiver pushed above {bound}");
                }
                if transfer.finalized {
                    // a bin is only given up when its tail task can't move or nobody can take it
                    match transfer.blocked_by {
                        Some(runtime) => assert!(runtime > transfer.budget_left),
                        None => assert!(transfer.to_load.is_none() || transfer.moved.is_empty()),
                    }
                    finalized.push(transfer.from.tasks.clone());
                } else {
                    assert!(transfer.blocked_by.is_none() && !transfer.moved.is_empty());
                }
            },
        );

        assert_eq!(bins.iter().map(|b| b.count()).sum::<usize>(), batch.len());
        for bin in bins.iter() {
            assert!(bin.load <= heaviest.max(bound) + 1e-6, "bin {:?} above {heaviest} and {bound}", bin);
            if bin.load > bound + 1e-9 {
                assert!(finalized.contains(&bin.tasks), "bin {:?} left above {bound} without being finalized", bin);
            }
            let load: f64 = bin.tasks.iter().map(|&t| batch.get(t).unwrap().cost).sum();
            assert!((load - bin.load).abs() < 1e-6);
        }

        let schedule = HfpHeterScheduler::new(config.clone()).unwrap().get_schedule(&batch);
        assert!(schedule.covers_exactly(&batch));
    }
}

#[test]
fn locality_ordering_is_idempotent() {
    let mut rng = Pcg64::seed_from_u64(7);
    let batch = gen_batch(&mut rng, 70, 256);
    let config = SchedulerConfig::new(4, 8);
    for name in SCHEDULERS {
        let mut schedule = resolve(name, &config).get_schedule(&batch);
        schedule.order_by_locality(&batch).unwrap();
        assert!(schedule.covers_exactly(&batch));
        let ordered = schedule.clone();
        schedule.order_by_locality(&batch).unwrap();
        assert_eq!(schedule, ordered, "{name}");
    }
}

#[test]
fn trace_to_report() {
    let trace = "\
(1, 300, [0, 8, 16], [24])
(2, 100, [0, 8], [])
(3, 200, [64, 72], [80])
(4, 100, [64], [88])
(0, 50, [], [])
#eof
";
    let records = parse_trace_records(trace).unwrap();
    let batch = TaskBatch::from_records(&records, &TraceOptions::default()).unwrap();
    // queue runs from the last record back, equal costs keep that order
    assert_eq!(batch.tasks().iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3, 4, 2]);

    let config = SchedulerConfig::new(2, 32).with_max_mem(Some(2));
    let mapper = BlockMapper::new(config.cache_block_size);
    let cache_config = CacheConfig {
        size: 256,
        associativity: 2,
        line_size: 32,
        miss_penalty: 10,
    };
    for name in SCHEDULERS {
        let mut schedule = resolve(name, &config).get_schedule(&batch);
        schedule.order_by_locality(&batch).unwrap();
        let report = RunReport::new(&schedule, &batch, &mapper).unwrap();
        assert!(schedule.covers_exactly(&batch), "{name}");
        assert_eq!(report.processors.iter().map(|p| p.completion_time).sum::<f64>(), 700.);

        let cache = replay(&schedule, &records, &cache_config).unwrap();
        assert_eq!(cache.processors.iter().map(|p| p.reads).sum::<u64>(), 8);
        assert_eq!(cache.processors.iter().map(|p| p.writes).sum::<u64>(), 3);
        for stats in cache.processors.iter() {
            assert_eq!(stats.hits + stats.misses, stats.reads + stats.writes);
        }
    }

    // tasks 1 and 2 share block 0, tasks 3 and 4 share block 64
    let schedule = resolve("Dmda", &config).get_schedule(&batch);
    assert_eq!(processor_of(&schedule, 1), processor_of(&schedule, 2));
    assert_eq!(processor_of(&schedule, 3), processor_of(&schedule, 4));
}

fn processor_of(schedule: &Schedule, task: TaskId) -> Option<usize> {
    schedule
        .iter()
        .find(|(_, tasks)| tasks.contains(&task))
        .map(|(proc_id, _)| proc_id)
}

#[test]
fn cache_replay_counts_every_access() {
    let mut rng = Pcg64::seed_from_u64(8);
    let trace = (0..40)
        .map(|id| {
            let base = rng.gen_range(0..1u64 << 16);
            let reads = (0..rng.gen_range(0..30)).map(|_| base + rng.gen_range(0..4096)).join(", ");
            let writes = (0..rng.gen_range(0..10)).map(|_| base + rng.gen_range(0..4096)).join(", ");
            format!("({id}, {}, [{reads}], [{writes}])\n", rng.gen_range(1..1000))
        })
        .collect::<String>();
    let records = parse_trace_records(&trace).unwrap();
    let batch = TaskBatch::from_records(&records, &TraceOptions::default()).unwrap();
    let config = SchedulerConfig::new(4, 64);
    let cache_config = CacheConfig {
        size: 1024,
        ..Default::default()
    };

    for name in SCHEDULERS {
        let schedule = resolve(name, &config).get_schedule(&batch);
        let report = replay(&schedule, &records, &cache_config).unwrap();
        assert_eq!(report.processors.len(), config.num_proc);
        for (stats, (_, tasks)) in report.processors.iter().zip(schedule.iter()) {
            let scheduled = tasks.iter().map(|&id| records.iter().find(|r| r.thread_id == id).unwrap());
            let (reads, writes) = scheduled.fold((0, 0), |(r, w), rec| {
                (r + rec.reads.len() as u64, w + rec.writes.len() as u64)
            });
            assert_eq!((stats.reads, stats.writes), (reads, writes), "{name}");
            assert_eq!(stats.hits + stats.misses, reads + writes);
            assert!(stats.evictions <= stats.misses);
            assert_eq!(stats.cycles, stats.hits + stats.misses * cache_config.miss_penalty);
        }
        assert_eq!(report.misses, report.processors.iter().map(|p| p.misses).sum::<u64>());
    }
}
