//! Patient queue simulation application.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;

use hqsim::{
    export, AppointmentType, Clock, PriorityWeights, Registration, Rescorer, SchedulingQueue,
    ServiceSimulator, SimulationConfig, StatsCollector,
};

/// Runs the patient queue simulation.
#[derive(Parser)]
#[clap(version)]
struct Opt {
    /// Number of virtual patients to generate.
    #[clap(long, default_value = "30")]
    patients: usize,

    /// Number of virtual doctors pulling from the queue concurrently.
    #[clap(long, default_value = "2")]
    doctors: usize,

    /// RNG seed for a reproducible run.
    #[clap(long)]
    seed: Option<u64>,

    /// Rescoring period of the background rescorer.
    #[clap(long, default_value = "2s", parse(try_from_str = humantime::parse_duration))]
    rescore_interval: Duration,

    /// Real-time unit of one simulated service step; each service holds a
    /// patient for 3-8 ticks.
    #[clap(long, default_value = "5ms", parse(try_from_str = humantime::parse_duration))]
    service_tick: Duration,

    /// Path to a JSON file overriding the default priority weights.
    #[clap(long)]
    weights: Option<PathBuf>,

    /// Where to write the serviced-patients report.
    #[clap(long, default_value = "serviced.csv")]
    output: PathBuf,

    /// Register the built-in sample patients and export a queue snapshot
    /// instead of running the simulation.
    #[clap(long)]
    sample: bool,

    /// Where the sample snapshot is written.
    #[clap(long, default_value = "snapshot.csv")]
    snapshot_output: PathBuf,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs in this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,
}

/// Set up a logger based on the given user options.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn load_weights(path: Option<&Path>) -> eyre::Result<PriorityWeights> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .wrap_err_with(|| format!("unable to open weights file: {}", path.display()))?;
            serde_json::from_reader(file).wrap_err("unable to parse weights file")
        }
        None => Ok(PriorityWeights::default()),
    }
}

/// Six demonstration patients for the `--sample` snapshot.
fn sample_registrations() -> Vec<Registration> {
    vec![
        Registration::new("Rohit", 65, 2, 3, AppointmentType::Scheduled),
        Registration::new("Sana", 30, 4, 5, AppointmentType::Emergency),
        Registration::new("Kavi", 8, 3, 4, AppointmentType::WalkIn),
        Registration::new("Maya", 50, 1, 2, AppointmentType::WalkIn),
        Registration::new("Arjun", 72, 2, 3, AppointmentType::WalkIn),
        Registration::new("Priya", 25, 4, 5, AppointmentType::Scheduled),
    ]
}

fn run_sample(opt: &Opt, queue: &SchedulingQueue) -> eyre::Result<()> {
    for registration in sample_registrations() {
        queue.register(registration)?;
    }
    let snapshot = queue.snapshot();
    for view in &snapshot {
        println!(
            "[{}] {} | sev {} | urg {} | {} | score {:.1}",
            view.id,
            view.name,
            view.severity,
            view.urgency,
            view.appointment_type.to_string(),
            view.score
        );
    }
    let file = File::create(&opt.snapshot_output).wrap_err_with(|| {
        format!(
            "unable to create snapshot file: {}",
            opt.snapshot_output.display()
        )
    })?;
    export::write_snapshot(file, &snapshot)?;
    println!("snapshot written to {}", opt.snapshot_output.display());
    Ok(())
}

fn run_simulation(opt: &Opt, queue: Arc<SchedulingQueue>, stats: &StatsCollector) -> eyre::Result<()> {
    let rescorer = Rescorer::start(Arc::clone(&queue), opt.rescore_interval);
    let simulator = ServiceSimulator::new(
        Arc::clone(&queue),
        SimulationConfig {
            patients: opt.patients,
            doctors: opt.doctors,
            seed: opt.seed,
            service_tick: opt.service_tick,
            progress: true,
            ..SimulationConfig::default()
        },
    );
    let report = simulator.run()?;
    rescorer.stop();

    let file = File::create(&opt.output)
        .wrap_err_with(|| format!("unable to create report file: {}", opt.output.display()))?;
    export::write_serviced(file, &report)?;

    let report = stats.stats();
    println!(
        "served {} patients; mean wait {}, p50 {}, p90 {}",
        report.served,
        format_secs(report.mean_wait_secs),
        format_secs(report.p50_wait_secs),
        format_secs(report.p90_wait_secs),
    );
    log::info!(
        "stats: {}",
        serde_json::to_string(&report).wrap_err("unable to serialize stats")?
    );
    println!("report written to {}", opt.output.display());
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_secs(secs: f64) -> String {
    humantime::format_duration(Duration::from_millis((secs * 1000.0).round() as u64)).to_string()
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;

    let weights = load_weights(opt.weights.as_deref())?;
    let clock = Arc::new(Clock::system());
    let (sender, stats) = StatsCollector::channel();
    let queue = Arc::new(SchedulingQueue::new(weights, clock).event_sender(sender));

    if opt.sample {
        run_sample(&opt, &queue)
    } else {
        run_simulation(&opt, queue, &stats)
    }
}
