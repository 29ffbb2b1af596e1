use clap::Parser;
use clap::Subcommand;
use utils::version;

use super::GenerateArgs;
use super::RunArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulation and print its report
    Run(Box<RunArgs>),
    /// Print a random workload as YAML
    Generate(GenerateArgs),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use test_log::test;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "simulator",
            "run",
            "--random",
            "3",
            "--policy",
            "srf",
            "--replacement",
            "lru",
            "--resources",
            "a.txt,b.txt",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.random, Some(3));
        assert_eq!(
            args.resources,
            Some(vec!["a.txt".to_string(), "b.txt".to_string()])
        );
    }

    #[test]
    fn workload_and_random_conflict() {
        let result = Cli::try_parse_from([
            "simulator",
            "run",
            "--workload",
            "w.yaml",
            "--random",
            "3",
        ]);
        assert!(result.is_err());
    }
}
