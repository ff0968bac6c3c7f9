use anyhow::Result;
use clap::Parser;
use testimpact::cli::{Cli, Commands};
use testimpact::commands::{self, record::RecordConfig, train::TrainConfig};
use testimpact::observability::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    if let Commands::Init { force } = cli.command {
        commands::init_config(&cli.root, force)?;
        return Ok(());
    }

    let config = commands::load_settings(&cli.root, cli.config.as_deref())?;
    match cli.command {
        Commands::Init { .. } => {}
        Commands::GenerateHistory { runs, seed } => {
            commands::generate_history(&cli.root, &config, runs, seed)?;
        }
        Commands::Train {
            family,
            max_iterations,
            max_secs,
        } => {
            let train = TrainConfig {
                family,
                max_iterations,
                max_secs,
            };
            commands::handle_train(&cli.root, config, train)?;
        }
        Commands::Select(args) => {
            commands::handle_select(&cli.root, config, &args)?;
        }
        Commands::Record {
            test,
            run,
            outcome,
            duration,
            coverage,
            flaky,
        } => {
            let record = RecordConfig {
                test,
                run,
                outcome,
                duration,
                coverage,
                flaky,
            };
            let run = commands::record_outcome(&cli.root, &config, record)?;
            println!("Recorded run {}", run);
        }
        Commands::Discover { project } => {
            commands::discover_coupling(&cli.root, &config, &project)?;
        }
    }
    Ok(())
}
