//! Raycast perception.
//!
//! Eight rays (north, then clockwise) leave the head. Each contributes three
//! features, `[apple, tail, wall]`, each the reciprocal of the distance in cells
//! to the first hit of that kind, or 0 when the ray reaches the wall without one.
//! Close things give large activations, far or absent things give ~0.

use crate::game::{Cell, GameEnvironment};
use crate::snake::SmartSnake;
use crate::utils::Move;

pub const FEATURES_PER_RAY: usize = 3;
pub const FEATURE_COUNT: usize = Move::COMPASS.len() * FEATURES_PER_RAY;

pub const APPLE: usize = 0;
pub const TAIL: usize = 1;
pub const WALL: usize = 2;

pub fn look<E: GameEnvironment + ?Sized>(snake: &SmartSnake, env: &E) -> [f32; FEATURE_COUNT] {
    let mut features = [0.0f32; FEATURE_COUNT];
    for (i, &dir) in Move::COMPASS.iter().enumerate() {
        let ray = &mut features[i * FEATURES_PER_RAY..(i + 1) * FEATURES_PER_RAY];
        let (apple, tail) = vision_objects(snake, env, dir);
        ray[APPLE] = apple;
        ray[TAIL] = tail;
        ray[WALL] = vision_wall(snake, env, dir);
    }
    features
}

/// First apple and first tail segment along `dir`. Stops once both are found.
fn vision_objects<E: GameEnvironment + ?Sized>(snake: &SmartSnake, env: &E, dir: Move) -> (f32, f32) {
    let mut apple = 0.0;
    let mut tail = 0.0;
    let mut pos = snake.head() + dir;
    let mut distance = 1;
    loop {
        match snake.cell_at(env, pos) {
            Cell::Wall => break,
            Cell::Apple if apple == 0.0 => apple = 1.0 / distance as f32,
            Cell::Tail if tail == 0.0 => tail = 1.0 / distance as f32,
            _ => {}
        }
        if apple > 0.0 && tail > 0.0 {
            break;
        }
        pos = pos + dir;
        distance += 1;
    }
    (apple, tail)
}

/// Steps from the head to the first cell outside the board.
fn vision_wall<E: GameEnvironment + ?Sized>(snake: &SmartSnake, env: &E, dir: Move) -> f32 {
    let mut pos = snake.head() + dir;
    let mut distance = 1;
    while env.is_occupied(pos) != Cell::Wall {
        pos = pos + dir;
        distance += 1;
    }
    1.0 / distance as f32
}
