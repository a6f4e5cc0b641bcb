use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use snake_evo::config::Config;
use snake_evo::log;
use snake_evo::progress::ProgressLedger;
use snake_evo::training::Trainer;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "snake_evo")]
#[command(about = "Evolve neural snake agents with a genetic algorithm")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the population for a number of generations
    Train {
        /// JSON config file; missing keys use defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Generations to run
        #[arg(short, long, default_value = "100")]
        generations: usize,

        /// Overrides the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Continue from the newest saved generation
        #[arg(long)]
        resume: bool,
    },

    /// Print the recorded fitness history
    Progress {
        /// JSON config file; missing keys use defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Most recent generations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { config, generations, seed, resume } => {
            let mut config = load_config(config.as_deref())?;
            if seed.is_some() {
                config.seed = seed;
            }
            log::init(config.log_file.as_deref())?;

            let mut trainer = Trainer::new(config, resume)?;
            let history = trainer.run(generations);
            if let Some(last) = history.last() {
                info!(
                    generation = last.generation_id,
                    elite_fitness = last.elite_fitness,
                    "training stopped"
                );
            }
            if let Some(path) = trainer.finish()? {
                info!(path = %path.display(), "last generation saved");
            }
        }
        Commands::Progress { config, limit } => {
            let config = load_config(config.as_deref())?;
            let Some(path) = config.progress_db else {
                bail!("progress_db is disabled in the config");
            };
            let ledger = ProgressLedger::open(&path).with_context(|| format!("opening {}", path.display()))?;
            println!("{:>10} {:>16} {:>16}", "generation", "average", "top");
            for row in ledger.history(limit)? {
                println!(
                    "{:>10} {:>16.2} {:>16.2}",
                    row.generation_id,
                    row.average_fitness(),
                    row.top_fitness
                );
            }
        }
    }
    Ok(())
}
