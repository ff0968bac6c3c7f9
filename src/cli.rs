use crate::config::ModelFamily;
use crate::core::Outcome;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "testimpact")]
#[command(about = "Change-impact driven regression test selection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project root; data paths in the config are relative to it
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to the nearest .testimpact.toml)
    #[arg(long, global = true, env = "TESTIMPACT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .testimpact.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Append seeded synthetic history for the sample project
    GenerateHistory {
        /// Number of CI runs to generate
        #[arg(long, default_value = "100")]
        runs: usize,

        /// Seed (defaults to the configured model seed)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train a new risk model from recorded history
    Train {
        /// Model family (random_forest, gradient_boosting, logistic_regression)
        #[arg(long)]
        family: Option<ModelFamily>,

        /// Cap on trees or epochs
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Wall-clock training budget in seconds
        #[arg(long)]
        max_secs: Option<f64>,
    },

    /// Select the tests to run for a change
    Select(SelectArgs),

    /// Record the outcome of one test execution
    Record {
        /// Test identifier, e.g. pkg/test_auth.py::test_login
        #[arg(long)]
        test: String,

        /// CI run index (defaults to the next run)
        #[arg(long)]
        run: Option<u64>,

        /// pass or fail
        #[arg(long)]
        outcome: Outcome,

        /// Execution time in seconds
        #[arg(long)]
        duration: f64,

        /// Covered fraction in [0, 1]
        #[arg(long, default_value = "0.0")]
        coverage: f64,

        /// The executor observed non-deterministic behaviour
        #[arg(long)]
        flaky: bool,
    },

    /// Build the coupling index by scanning a Python project
    Discover {
        /// Project directory to scan
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
    /// Source tree before the change
    #[arg(long, requires = "new_dir", conflicts_with_all = ["diff", "changed"])]
    pub old_dir: Option<PathBuf>,

    /// Source tree after the change
    #[arg(long, requires = "old_dir")]
    pub new_dir: Option<PathBuf>,

    /// Unified diff of the change
    #[arg(long, conflicts_with = "changed")]
    pub diff: Option<PathBuf>,

    /// Changed paths, treated as whole-file changes
    #[arg(long, num_args = 1..)]
    pub changed: Vec<PathBuf>,

    /// Write the full selection result as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write selected test ids, one per line (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub min_tests: Option<usize>,

    #[arg(long)]
    pub max_tests: Option<usize>,

    /// High-risk threshold in [0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Time budget in seconds
    #[arg(long)]
    pub time_budget: Option<f64>,

    /// Suppress the summary table
    #[arg(long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_select_with_changed_paths() {
        let cli = Cli::try_parse_from(["testimpact", "-vv", "select", "--changed", "a.py", "b.py"]).unwrap();
        assert_eq!(cli.verbosity, 2);
        match cli.command {
            Commands::Select(args) => assert_eq!(args.changed.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_old_dir_requires_new_dir() {
        assert!(Cli::try_parse_from(["testimpact", "select", "--old-dir", "a"]).is_err());
    }

    #[test]
    fn test_record_parses_outcome() {
        let cli = Cli::try_parse_from([
            "testimpact", "record", "--test", "t::a", "--outcome", "fail", "--duration", "0.3",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { outcome, .. } => assert_eq!(outcome, Outcome::Fail),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
