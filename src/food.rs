use crate::border::Border;
use crate::utils::{Position, SimRng};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

const RANDOM_TRIES: usize = 64;

/// Apples on the board. Placement never lands on an occupied cell or another apple.
#[derive(Debug)]
pub struct Food {
    apples: Vec<Position>,
    target: usize,
    rng: SimRng,
}

impl Food {
    pub fn new(target: usize, rng: SimRng) -> Self {
        Self { apples: Vec::with_capacity(target), target, rng }
    }

    pub fn apples(&self) -> &[Position] {
        &self.apples
    }

    pub fn contains(&self, p: Position) -> bool {
        self.apples.contains(&p)
    }

    pub fn remove(&mut self, p: Position) -> bool {
        let before = self.apples.len();
        self.apples.retain(|&a| a != p);
        self.apples.len() != before
    }

    /// Top the board back up to the target apple count.
    pub fn respawn(&mut self, border: &Border, occupied: &[Position]) {
        while self.apples.len() < self.target {
            match self.free_cell(border, occupied) {
                Some(pos) => self.apples.push(pos),
                None => {
                    debug!("board full, no room for another apple");
                    break;
                }
            }
        }
    }

    fn free_cell(&mut self, border: &Border, occupied: &[Position]) -> Option<Position> {
        let taken = |p: &Position| occupied.contains(p) || self.apples.contains(p);
        for _ in 0..RANDOM_TRIES {
            let pos = Position::new(
                self.rng.gen_range(0..border.width),
                self.rng.gen_range(0..border.height),
            );
            if !taken(&pos) {
                return Some(pos);
            }
        }
        // crowded board: pick among the cells that are actually free
        let free: Vec<Position> = (0..border.height)
            .flat_map(|y| (0..border.width).map(move |x| Position::new(x, y)))
            .filter(|p| !taken(p))
            .collect();
        free.choose(&mut self.rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_rng;

    #[test]
    fn respawn_avoids_occupied_cells() {
        let border = Border::new(3, 3);
        let occupied: Vec<Position> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Position::new(x, y)))
            .filter(|&p| p != Position::new(2, 2))
            .collect();
        let mut food = Food::new(1, create_rng(1));
        food.respawn(&border, &occupied);
        assert_eq!(food.apples(), &[Position::new(2, 2)]);
    }

    #[test]
    fn full_board_places_nothing() {
        let border = Border::new(2, 1);
        let mut food = Food::new(2, create_rng(2));
        food.respawn(&border, &[Position::new(0, 0), Position::new(1, 0)]);
        assert!(food.apples().is_empty());
    }

    #[test]
    fn respawn_tops_up_to_target_without_duplicates() {
        let border = Border::new(10, 10);
        let mut food = Food::new(3, create_rng(3));
        food.respawn(&border, &[]);
        assert_eq!(food.apples().len(), 3);
        let first = food.apples()[0];
        assert!(food.remove(first));
        assert_eq!(food.apples().len(), 2);
        assert!(!food.remove(first));
        food.respawn(&border, &[]);
        let apples = food.apples();
        assert_eq!(apples.len(), 3);
        assert!(apples.iter().enumerate().all(|(i, a)| !apples[i + 1..].contains(a)));
    }
}
