use crate::config::{Config, ConfigError};
use crate::db::{StoreError, WriteBehind};
use crate::evolution::{Advance, GenerationStats, Population};
use crate::game::Board;
use crate::log;
use crate::utils::{SimRng, create_rng};
use rand::Rng;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Plays every agent of the population in turn on its own board and breeds
/// the next generation when the last one is done.
pub struct Trainer {
    config: Config,
    population: Population,
    boards: SimRng,
}

impl Trainer {
    /// Fresh population, or the newest saved one when `resume` is set.
    ///
    /// Resuming with nothing saved warns and starts from scratch; any other load
    /// failure is returned.
    pub fn new(config: Config, resume: bool) -> Result<Self, TrainError> {
        let breeding = config.breeding()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::thread_rng().r#gen();
                info!(seed, "no seed configured, drew one");
                seed
            }
        };
        // selection, crossover and mutation draw from this stream
        let rng = create_rng(seed);
        let store = config.store();

        let population = if resume {
            match Population::load(&store, breeding, rng.clone()) {
                Ok(population) => population,
                Err(StoreError::MissingPersistedData(dir)) => {
                    warn!(dir = %dir.display(), "nothing to resume from, starting a fresh population");
                    Population::random(breeding, rng)
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Population::random(breeding, rng)
        };

        // finished generations are saved off the training thread
        let writer = WriteBehind::new(store, config.progress_db.clone());
        let population = population.with_writer(writer, config.save_whole_generation);
        info!(
            population = population.len(),
            generation = population.generation_id(),
            width = config.board_width,
            height = config.board_height,
            "trainer ready"
        );

        Ok(Self { config, population, boards: create_rng(seed.wrapping_add(1)) })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Play the current agent to the end of its game, then hand the turn on.
    pub fn play_turn(&mut self) -> Advance {
        // fixed apple sequence, or a fresh one per game
        let board_seed = match self.config.apple_seed {
            Some(seed) => seed,
            None => self.boards.r#gen(),
        };
        let mut board = Board::new(
            self.config.board_width,
            self.config.board_height,
            self.config.apple_count,
            create_rng(board_seed),
        );

        let agent = self.population.current_agent_mut();
        board.start(&agent.cells());
        // hunger bounds the game, no tick cap needed
        while agent.is_alive() && !board.is_over() {
            agent.tick(&mut board);
        }
        self.population.advance()
    }

    pub fn run_generation(&mut self) -> GenerationStats {
        let started = Instant::now();
        loop {
            if let Advance::NewGeneration(stats) = self.play_turn() {
                report(&stats, started);
                return stats;
            }
        }
    }

    pub fn run(&mut self, generations: usize) -> Vec<GenerationStats> {
        (0..generations).map(|_| self.run_generation()).collect()
    }

    /// Wait for the last background save and report where it went.
    pub fn finish(mut self) -> Result<Option<PathBuf>, StoreError> {
        self.population.flush().transpose()
    }
}

fn report(stats: &GenerationStats, started: Instant) {
    info!(
        generation = stats.generation_id,
        total_fitness = stats.total_fitness,
        elite_fitness = stats.elite_fitness,
        elite_moves = stats.elite_moves,
        elite_tail = stats.elite_tail,
        elapsed = ?started.elapsed(),
        "generation finished"
    );
    let step = u64::from(stats.generation_id);
    log::scalar(step, "total_fitness", stats.total_fitness);
    log::scalar(step, "mean_fitness", stats.mean_fitness);
    log::scalar(step, "elite_fitness", stats.elite_fitness);
    log::scalar(step, "elite_tail", stats.elite_tail as f64);
}
