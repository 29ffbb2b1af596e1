mod config;
mod driver;
mod logging;
mod metrics;
mod report;
mod workload;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sim_core::DEFAULT_RESOURCES;
use utils::version;

use crate::config::Cli;
use crate::config::Commands;
use crate::config::GenerateArgs;
use crate::config::OutputFormat;
use crate::config::RunArgs;
use crate::metrics::MetricsRecorder;
use crate::report::TextReport;
use crate::workload::Workload;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => run(&run_args),
        Commands::Generate(generate_args) => generate(&generate_args),
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let _guard = logging::init(args.metrics_file.as_deref())?;

    tracing::info!("Starting simulator {}", &**version::VERSION);

    let (config, processes) = driver::prepare(args)?;
    let mut recorder = MetricsRecorder::new(args.metrics_batch_size, config.scheduling);
    let scheduler = driver::simulate(config, processes, args.max_ticks, &mut recorder)?;

    let report = scheduler.report();
    match args.format {
        OutputFormat::Text => print!("{}", TextReport::new(&report, args.events)),
        OutputFormat::Json => {
            let json = report::render_json(&report).context("failed to serialize report")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn generate(args: &GenerateArgs) -> Result<()> {
    utils::logging::init();

    let resources = match &args.resources {
        Some(resources) => resources.clone(),
        None => DEFAULT_RESOURCES.iter().map(|s| s.to_string()).collect(),
    };
    let workload = Workload {
        config: None,
        processes: workload::generate(args.count, args.seed, &resources),
    };
    let yaml = workload.to_yaml().context("failed to serialize workload")?;
    print!("{yaml}");
    Ok(())
}
