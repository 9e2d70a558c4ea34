use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use locality_sched::scheduler::default_scheduler_resolver;

mod experiment;

use experiment::Experiment;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs locality-aware scheduling experiments over memory traces
struct Args {
    /// Path to YAML file with experiment configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Path to produced JSON file with experiment results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of threads to use (default - use all available cores)
    #[arg(short, long, default_value_t = std::thread::available_parallelism().map_or(1, |n| n.get()))]
    threads: usize,
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let experiment = Experiment::load(&args.config, default_scheduler_resolver);

    let results = experiment.run(args.threads);

    let output = args.output.unwrap_or_else(|| {
        let stem = args.config.file_stem().and_then(|s| s.to_str()).unwrap_or("experiment");
        args.config
            .with_file_name([stem, "-results"].concat())
            .with_extension("json")
    });
    std::fs::File::create(output)?.write_all(serde_json::to_string_pretty(&results)?.as_bytes())
}
