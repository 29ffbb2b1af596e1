use anyhow::Context;
use anyhow::Result;
use sim_core::ProcessSpec;
use sim_core::Scheduler;
use sim_core::SimConfig;

use crate::config::RunArgs;
use crate::metrics::MetricsRecorder;
use crate::workload;
use crate::workload::Workload;

/// Processes generated when neither a workload file nor a count is given.
pub(crate) const DEFAULT_RANDOM_PROCESSES: usize = 4;

/// Resolves the configuration and the process list for a run.
///
/// Configuration layers are, from weakest to strongest: built-in defaults, the workload
/// file's `config` section, command line flags.
pub(crate) fn prepare(args: &RunArgs) -> Result<(SimConfig, Vec<ProcessSpec>)> {
    match &args.workload {
        Some(path) => {
            let workload = Workload::load(path)?;
            let config = args.apply(workload.config.unwrap_or_default());
            Ok((config, workload.processes))
        }
        None => {
            let config = args.apply(SimConfig::default());
            let count = args.random.unwrap_or(DEFAULT_RANDOM_PROCESSES);
            let processes = workload::generate(count, args.seed, &config.resources);
            Ok((config, processes))
        }
    }
}

/// Admits `processes` and ticks until every process terminates or `max_ticks` elapse.
pub(crate) fn simulate(
    config: SimConfig,
    processes: Vec<ProcessSpec>,
    max_ticks: u64,
    recorder: &mut MetricsRecorder,
) -> Result<Scheduler> {
    let mut scheduler =
        Scheduler::new(config).map_err(|e| anyhow::anyhow!("invalid configuration: {e:?}"))?;
    for spec in processes {
        let pid = spec.id;
        scheduler
            .admit(spec)
            .map_err(|e| anyhow::anyhow!("failed to admit process: {e:?}"))
            .with_context(|| format!("process {pid}"))?;
    }

    tracing::info!(
        policy = %scheduler.config().scheduling,
        replacement = %scheduler.config().replacement,
        frames = scheduler.config().frames,
        processes = scheduler.processes().count(),
        "simulation started"
    );

    while scheduler.has_active_processes() && scheduler.current_tick() < max_ticks {
        let executed = scheduler.tick();
        recorder.observe(&scheduler, executed);
    }
    recorder.summary(&scheduler);

    if scheduler.has_active_processes() {
        tracing::warn!(
            max_ticks,
            unfinished = scheduler.processes().filter(|p| !p.is_terminated()).count(),
            "tick budget exhausted before every process terminated"
        );
    } else {
        tracing::info!(ticks = scheduler.current_tick(), "simulation finished");
    }
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use similar_asserts::assert_eq;
    use sim_core::SchedulingPolicy;
    use test_log::test;

    use super::*;
    use crate::config::Cli;
    use crate::config::Commands;

    fn run_args(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(["simulator", "run"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Run(args) => *args,
            Commands::Generate(_) => panic!("expected run subcommand"),
        }
    }

    fn recorder() -> MetricsRecorder {
        MetricsRecorder::new(10, SchedulingPolicy::RoundRobin)
    }

    #[test]
    fn defaults_to_four_random_processes() {
        let (config, processes) = prepare(&run_args(&["--seed", "3"])).unwrap();
        assert_eq!(processes.len(), DEFAULT_RANDOM_PROCESSES);
        assert_eq!(config.seed, Some(3));
        for spec in &processes {
            assert!(spec
                .resources
                .iter()
                .all(|name| config.resources.contains(name)));
        }
    }

    #[test]
    fn flags_override_workload_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "config:\n  quantum: 5\n  frames: 2\nprocesses:\n  - id: 1\n    burst: 3"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let (config, processes) = prepare(&run_args(&["--workload", path, "--frames", "8"])).unwrap();
        assert_eq!(config.quantum, 5);
        assert_eq!(config.frames, 8);
        assert_eq!(processes, vec![ProcessSpec::new(1, 3)]);
    }

    #[test]
    fn runs_generated_workload_to_completion() {
        let (config, processes) = prepare(&run_args(&["--random", "6", "--seed", "17"])).unwrap();
        let scheduler = simulate(config, processes, 1_000, &mut recorder()).unwrap();

        assert!(!scheduler.has_active_processes());
        let metrics = scheduler.metrics();
        assert_eq!(metrics.completed, 6);
        let total_burst: u64 = scheduler
            .processes()
            .map(|p| u64::from(p.total_burst()))
            .sum();
        assert_eq!(metrics.busy_ticks, total_burst);
    }

    #[test]
    fn stops_at_tick_budget() {
        let processes = vec![ProcessSpec::new(1, 50)];
        let scheduler = simulate(SimConfig::default(), processes, 10, &mut recorder()).unwrap();

        assert_eq!(scheduler.current_tick(), 10);
        assert!(scheduler.has_active_processes());
        assert_eq!(scheduler.process(1).unwrap().remaining_burst(), 40);
    }

    #[test]
    fn rejects_unknown_resources() {
        let processes = vec![ProcessSpec::new(1, 5).with_resources(["printer"])];
        let result = simulate(SimConfig::default(), processes, 10, &mut recorder());
        assert!(result.is_err());
    }
}
