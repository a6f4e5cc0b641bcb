use crate::brain::Mutation;
use crate::db::GenerationStore;
use crate::evolution::Breeding;
use crate::snake::Hunger;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Training hyperparameters and file locations. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Board size in cells.
    pub board_width: i32,
    pub board_height: i32,
    /// Apples kept on the board at once.
    pub apple_count: usize,
    /// Agents per generation.
    pub population_size: usize,
    /// Per-scalar probability of a mutation draw.
    pub mutation_rate: f64,
    /// Probability that crossover blends the parents instead of cloning the first.
    pub crossover_rate: f64,
    /// Mutation noise is `Normal(mutation_mu, mutation_sigma) * mutation_scale`.
    pub mutation_mu: f32,
    pub mutation_sigma: f32,
    pub mutation_scale: f32,
    /// Moves a newborn snake may make without eating.
    pub initial_hunger: u32,
    /// Moves added per apple.
    pub apple_hunger_bonus: u32,
    /// Seed for selection, crossover and mutation draws. Random when unset.
    pub seed: Option<u64>,
    /// When set, every game sees the same apple sequence.
    pub apple_seed: Option<u64>,
    /// Root for saved generations.
    pub data_dir: PathBuf,
    /// Save every brain of a finished generation, not just the elite.
    pub save_whole_generation: bool,
    /// SQLite progress history; `None` disables it.
    pub progress_db: Option<PathBuf>,
    /// Append log lines here as well as to stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board_width: 40,
            board_height: 40,
            apple_count: 1,
            population_size: 1000,
            mutation_rate: 0.01,
            crossover_rate: 0.8,
            mutation_mu: 0.0,
            mutation_sigma: 1.0,
            mutation_scale: 0.2,
            initial_hunger: 200,
            apple_hunger_bonus: 100,
            seed: None,
            apple_seed: None,
            data_dir: PathBuf::from("data"),
            save_whole_generation: true,
            progress_db: Some(PathBuf::from("data/progress.db")),
            log_file: Some(PathBuf::from("train.log")),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.population_size < 2 {
            return invalid(format!("population_size must be at least 2, got {}", self.population_size));
        }
        for (name, rate) in [("mutation_rate", self.mutation_rate), ("crossover_rate", self.crossover_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return invalid(format!("{name} must be within [0, 1], got {rate}"));
            }
        }
        if !(self.mutation_sigma > 0.0 && self.mutation_sigma.is_finite()) {
            return invalid(format!("mutation_sigma must be positive, got {}", self.mutation_sigma));
        }
        if !self.mutation_mu.is_finite() || !self.mutation_scale.is_finite() {
            return invalid("mutation_mu and mutation_scale must be finite".into());
        }
        // the starting snake occupies (3..=5, 5)
        if self.board_width < 7 || self.board_height < 7 {
            return invalid(format!(
                "board {}x{} is too small for the starting snake",
                self.board_width, self.board_height
            ));
        }
        if self.apple_count == 0 {
            return invalid("apple_count must be at least 1".into());
        }
        Ok(())
    }

    pub fn hunger(&self) -> Hunger {
        Hunger { initial: self.initial_hunger, apple_bonus: self.apple_hunger_bonus }
    }

    pub fn mutation(&self) -> Result<Mutation, ConfigError> {
        Mutation::new(self.mutation_rate, self.mutation_mu, self.mutation_sigma, self.mutation_scale)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn breeding(&self) -> Result<Breeding, ConfigError> {
        self.validate()?;
        Ok(Breeding {
            size: self.population_size,
            mutation: self.mutation()?,
            crossover_rate: self.crossover_rate,
            hunger: self.hunger(),
        })
    }

    pub fn store(&self) -> GenerationStore {
        GenerationStore::new(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        let breeding = config.breeding().unwrap();
        assert_eq!(breeding.size, 1000);
        assert_eq!(breeding.hunger, Hunger::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{ "population_size": 50, "seed": 9 }"#).unwrap();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.board_width, 40);
        assert_eq!(config.crossover_rate, 0.8);
    }

    #[test]
    fn bad_values_are_rejected() {
        let cases = [
            Config { population_size: 1, ..Config::default() },
            Config { mutation_rate: 1.5, ..Config::default() },
            Config { crossover_rate: -0.1, ..Config::default() },
            Config { mutation_sigma: 0.0, ..Config::default() },
            Config { board_width: 6, ..Config::default() },
            Config { apple_count: 0, ..Config::default() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }
}
