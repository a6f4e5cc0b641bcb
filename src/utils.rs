use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Random source used everywhere a draw happens (mutation, crossover, roulette, apples).
pub type SimRng = ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> SimRng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Integer (dx, dy) step on the grid.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Move {
    pub dx: i32,
    pub dy: i32,
}

impl Move {
    pub const NORTH: Move = Move::new(0, -1);
    pub const NORTH_EAST: Move = Move::new(1, -1);
    pub const EAST: Move = Move::new(1, 0);
    pub const SOUTH_EAST: Move = Move::new(1, 1);
    pub const SOUTH: Move = Move::new(0, 1);
    pub const SOUTH_WEST: Move = Move::new(-1, 1);
    pub const WEST: Move = Move::new(-1, 0);
    pub const NORTH_WEST: Move = Move::new(-1, -1);

    /// The eight ray directions, clockwise from north. Perception relies on this order.
    pub const COMPASS: [Move; 8] = [
        Move::NORTH,
        Move::NORTH_EAST,
        Move::EAST,
        Move::SOUTH_EAST,
        Move::SOUTH,
        Move::SOUTH_WEST,
        Move::WEST,
        Move::NORTH_WEST,
    ];

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

impl Mul<i32> for Move {
    type Output = Move;

    fn mul(self, k: i32) -> Move {
        Move::new(self.dx * k, self.dy * k)
    }
}

/// Component-wise product.
impl Mul<Move> for Move {
    type Output = Move;

    fn mul(self, other: Move) -> Move {
        Move::new(self.dx * other.dx, self.dy * other.dy)
    }
}

/// Grid cell coordinate, (0, 0) is the top-left corner.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add<Move> for Position {
    type Output = Position;

    fn add(self, step: Move) -> Position {
        Position::new(self.x + step.dx, self.y + step.dy)
    }
}

/// Offsets both coordinates by the same amount.
impl Add<i32> for Position {
    type Output = Position;

    fn add(self, offset: i32) -> Position {
        Position::new(self.x + offset, self.y + offset)
    }
}

impl Sub for Position {
    type Output = Move;

    fn sub(self, other: Position) -> Move {
        Move::new(self.x - other.x, self.y - other.y)
    }
}

/// Simple summary of a fitness column: min / max / mean / sum.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
}

pub fn vec_stats(xs: &[f64]) -> Stats {
    if xs.is_empty() {
        return Stats { min: 0.0, max: 0.0, mean: 0.0, sum: 0.0 };
    }
    let mut mn = xs[0];
    let mut mx = xs[0];
    let mut sum = 0.0;
    for &v in xs {
        mn = mn.min(v);
        mx = mx.max(v);
        sum += v;
    }
    Stats { min: mn, max: mx, mean: sum / xs.len() as f64, sum }
}

pub fn has_non_finite(xs: &[f32]) -> bool {
    xs.iter().any(|&v| !v.is_finite())
}
