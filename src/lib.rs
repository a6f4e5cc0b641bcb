//! Snake agents with small feedforward brains, trained by a generational
//! genetic algorithm.

pub mod border;
pub mod brain;
pub mod config;
pub mod db;
pub mod evolution;
pub mod food;
pub mod game;
pub mod game_input;
pub mod log;
pub mod matrix;
pub mod progress;
pub mod snake;
pub mod training;
pub mod utils;
