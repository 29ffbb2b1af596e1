use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use sim_core::AccessPattern;
use sim_core::ReplacementPolicy;
use sim_core::SchedulingPolicy;
use sim_core::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[arg(
        long,
        help = "YAML workload file with processes and optional config",
        env = "SIM_WORKLOAD",
        value_hint = clap::ValueHint::FilePath,
        conflicts_with = "random"
    )]
    pub workload: Option<PathBuf>,

    #[arg(long, help = "Generate this many random processes", value_name = "COUNT")]
    pub random: Option<usize>,

    #[arg(
        long,
        help = "Seed for workload generation and random page access",
        env = "SIM_SEED"
    )]
    pub seed: Option<u64>,

    #[arg(long, help = "CPU scheduling policy: rr, srf or priority", env = "SIM_POLICY")]
    pub policy: Option<SchedulingPolicy>,

    #[arg(long, help = "Round-robin quantum in ticks", env = "SIM_QUANTUM")]
    pub quantum: Option<u32>,

    #[arg(long, help = "Number of physical frames", env = "SIM_FRAMES")]
    pub frames: Option<usize>,

    #[arg(long, help = "Page replacement policy: fifo or lru", env = "SIM_REPLACEMENT")]
    pub replacement: Option<ReplacementPolicy>,

    #[arg(long, help = "Page access pattern: random or sequential")]
    pub access: Option<AccessPattern>,

    #[arg(
        long,
        help = "File resource names, comma separated",
        value_delimiter = ','
    )]
    pub resources: Option<Vec<String>>,

    #[arg(long, help = "Executed ticks a granted resource stays held")]
    pub resource_hold: Option<u32>,

    #[arg(long, help = "Stop after this many ticks", default_value = "100")]
    pub max_ticks: u64,

    #[arg(long, value_enum, help = "Report format", default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(
        long,
        help = "Number of trailing events shown in the text report",
        default_value = "20"
    )]
    pub events: usize,

    #[arg(
        long,
        help = "Write InfluxDB line protocol metrics to this file",
        env = "SIM_METRICS_FILE",
        value_hint = clap::ValueHint::FilePath
    )]
    pub metrics_file: Option<PathBuf>,

    #[arg(
        long,
        help = "Number of ticks averaged into each metrics sample",
        default_value = "10"
    )]
    pub metrics_batch_size: usize,
}

impl RunArgs {
    /// Applies command line overrides on top of `base`.
    pub fn apply(&self, base: SimConfig) -> SimConfig {
        let mut config = base;
        if let Some(policy) = self.policy {
            config = config.with_scheduling(policy);
        }
        if let Some(quantum) = self.quantum {
            config = config.with_quantum(quantum);
        }
        if let Some(frames) = self.frames {
            config = config.with_frames(frames);
        }
        if let Some(replacement) = self.replacement {
            config = config.with_replacement(replacement);
        }
        if let Some(access) = self.access {
            config = config.with_access_pattern(access);
        }
        if let Some(resources) = &self.resources {
            config = config.with_resources(resources.iter().cloned());
        }
        if let Some(resource_hold) = self.resource_hold {
            config = config.with_resource_hold(resource_hold);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
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

    #[test]
    fn overrides_only_given_fields() {
        let base = SimConfig::new().with_quantum(7).with_frames(9);
        let config = run_args(&["--policy", "priority", "--frames", "2"]).apply(base);

        assert_eq!(config.scheduling, SchedulingPolicy::Priority);
        assert_eq!(config.frames, 2);
        assert_eq!(config.quantum, 7);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn defaults() {
        let args = run_args(&[]);
        assert_eq!(args.max_ticks, 100);
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.metrics_batch_size, 10);
        assert_eq!(args.apply(SimConfig::default()), SimConfig::default());
    }

    #[test]
    fn rejects_unknown_policy() {
        let result = Cli::try_parse_from(["simulator", "run", "--policy", "lottery"]);
        assert!(result.is_err());
    }
}
