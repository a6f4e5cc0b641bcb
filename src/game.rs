use crate::border::Border;
use crate::food::Food;
use crate::utils::{Position, SimRng};
use tracing::trace;

/// What a grid cell holds, as seen by a snake.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Apple,
    Tail,
    Wall,
}

/// The board an agent plays on.
///
/// Agents borrow it for the duration of a tick and never keep a handle to it.
/// The agent's own body is not part of the environment: the agent overlays it
/// when sensing (see `SmartSnake::cell_at`).
pub trait GameEnvironment {
    /// `Wall` for anything outside the board.
    fn is_occupied(&self, position: Position) -> Cell;
    /// Replace eaten apples, avoiding `occupied` cells.
    fn place_apple(&mut self, occupied: &[Position]);
    fn remove_apple(&mut self, position: Position);
    fn notify_score_increment(&mut self);
    /// The current agent's turn is over.
    fn notify_game_over(&mut self);
}

/// Headless board: walls at the border, apples inside, score bookkeeping.
#[derive(Debug)]
pub struct Board {
    border: Border,
    food: Food,
    score: u32,
    high_score: u32,
    game_over: bool,
}

impl Board {
    pub fn new(width: i32, height: i32, apple_count: usize, rng: SimRng) -> Self {
        Self {
            border: Border::new(width, height),
            food: Food::new(apple_count, rng),
            score: 0,
            high_score: 0,
            game_over: false,
        }
    }

    /// Begin a game with a snake occupying `occupied`.
    pub fn start(&mut self, occupied: &[Position]) {
        self.score = 0;
        self.game_over = false;
        self.food.respawn(&self.border, occupied);
    }

    pub fn border(&self) -> &Border {
        &self.border
    }

    pub fn apples(&self) -> &[Position] {
        self.food.apples()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }
}

impl GameEnvironment for Board {
    fn is_occupied(&self, position: Position) -> Cell {
        if !self.border.is_inside(position) {
            Cell::Wall
        } else if self.food.contains(position) {
            Cell::Apple
        } else {
            Cell::Empty
        }
    }

    fn place_apple(&mut self, occupied: &[Position]) {
        self.food.respawn(&self.border, occupied);
    }

    fn remove_apple(&mut self, position: Position) {
        self.food.remove(position);
    }

    fn notify_score_increment(&mut self) {
        self.score += 1;
        self.high_score = self.high_score.max(self.score);
    }

    fn notify_game_over(&mut self) {
        trace!(score = self.score, "game over");
        self.game_over = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_rng;

    #[test]
    fn outside_is_wall_and_apples_are_reported() {
        let mut board = Board::new(5, 5, 1, create_rng(1));
        board.start(&[]);
        let apple = board.apples()[0];
        assert_eq!(board.is_occupied(apple), Cell::Apple);
        assert_eq!(board.is_occupied(Position::new(-1, 2)), Cell::Wall);
        assert_eq!(board.is_occupied(Position::new(2, 5)), Cell::Wall);

        board.remove_apple(apple);
        assert_eq!(board.is_occupied(apple), Cell::Empty);
        board.place_apple(&[]);
        assert_eq!(board.apples().len(), 1);
    }

    #[test]
    fn score_and_game_over_bookkeeping() {
        let mut board = Board::new(5, 5, 1, create_rng(2));
        board.start(&[]);
        board.notify_score_increment();
        board.notify_score_increment();
        board.notify_game_over();
        assert!(board.is_over());
        assert_eq!((board.score(), board.high_score()), (2, 2));

        board.start(&[]);
        assert!(!board.is_over());
        assert_eq!((board.score(), board.high_score()), (0, 2));
    }
}
