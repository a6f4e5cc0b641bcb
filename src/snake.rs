use crate::brain::{Mutation, NeuralBrain};
use crate::game::{Cell, GameEnvironment};
use crate::game_input;
use crate::utils::{Move, Position};
use rand::Rng;
use std::collections::VecDeque;
use tracing::trace;

/// Cap on the tail-length exponent in the fitness, keeps the score finite.
const FITNESS_GROWTH_CAP: usize = 512;

/// The four headings a snake can travel in, in brain output order.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    /// Heading for a brain output index, `None` past the last one.
    pub fn from_index(i: usize) -> Option<Heading> {
        Heading::ALL.get(i).copied()
    }

    // 180° turn
    pub fn opposite(&self) -> Heading {
        match self {
            Heading::Up => Heading::Down,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
            Heading::Right => Heading::Left,
        }
    }

    pub fn delta(&self) -> Move {
        match self {
            Heading::Up => Move::NORTH,
            Heading::Down => Move::SOUTH,
            Heading::Left => Move::WEST,
            Heading::Right => Move::EAST,
        }
    }
}

/// Hunger budget: moves allowed at birth and moves gained per apple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hunger {
    pub initial: u32,
    pub apple_bonus: u32,
}

impl Default for Hunger {
    fn default() -> Self {
        Self { initial: 200, apple_bonus: 100 }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DeathCause {
    Starvation,
    Collision,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TickOutcome {
    Moved,
    Ate,
    Died(DeathCause),
}

/// `moves² · 2^len(tail)`: zero until the first move, then strictly increasing in
/// moves and non-decreasing in tail length.
pub fn fitness_for(moves: u64, tail_len: usize) -> f64 {
    let moves = moves as f64;
    moves * moves * 2f64.powi(tail_len.min(FITNESS_GROWTH_CAP) as i32)
}

/// One evolvable snake: a brain plus the body it steers.
#[derive(Clone, Debug)]
pub struct SmartSnake {
    head: Position,
    tail: VecDeque<Position>, // tip first, the segment behind the head last
    heading: Heading,
    left_to_live: i64,
    hunger: Hunger,
    alive: bool,
    death: Option<DeathCause>,
    moves: u64,
    pub(crate) fitness: f64,
    brain: NeuralBrain,
}

impl SmartSnake {
    /// Head at (5, 5) facing right, two tail segments trailing to the left.
    pub fn new(brain: NeuralBrain, hunger: Hunger) -> Self {
        Self::with_body(
            brain,
            hunger,
            Position::new(5, 5),
            vec![Position::new(3, 5), Position::new(4, 5)],
            Heading::Right,
        )
    }

    /// Arbitrary starting body; `tail` runs from the tip to the segment behind the head.
    pub fn with_body(brain: NeuralBrain, hunger: Hunger, head: Position, tail: Vec<Position>, heading: Heading) -> Self {
        Self {
            head,
            tail: tail.into(),
            heading,
            left_to_live: hunger.initial as i64,
            hunger,
            alive: true,
            death: None,
            moves: 0,
            fitness: 0.0,
            brain,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R, hunger: Hunger) -> Self {
        Self::new(NeuralBrain::random(rng), hunger)
    }

    pub fn head(&self) -> Position {
        self.head
    }

    pub fn tail(&self) -> impl Iterator<Item = Position> + '_ {
        self.tail.iter().copied()
    }

    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }

    /// Head and tail cells.
    pub fn cells(&self) -> Vec<Position> {
        std::iter::once(self.head).chain(self.tail()).collect()
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn left_to_live(&self) -> i64 {
        self.left_to_live
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn death(&self) -> Option<DeathCause> {
        self.death
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn brain(&self) -> &NeuralBrain {
        &self.brain
    }

    /// What the snake sees at `p`: its own tail first, then the board.
    pub fn cell_at<E: GameEnvironment + ?Sized>(&self, env: &E, p: Position) -> Cell {
        if self.tail.contains(&p) {
            Cell::Tail
        } else {
            env.is_occupied(p)
        }
    }

    /// A newborn snake carrying a copy of this brain.
    pub fn fresh_clone(&self) -> SmartSnake {
        SmartSnake::new(self.brain.clone(), self.hunger)
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, mutation: &Mutation) {
        self.brain.mutate(rng, mutation);
    }

    /// A newborn snake whose brain is the crossover of both parents.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &SmartSnake, rng: &mut R, crossover_rate: f64) -> SmartSnake {
        SmartSnake::new(self.brain.crossover(&other.brain, rng, crossover_rate), self.hunger)
    }

    /// Advance one simulated tick.
    ///
    /// Order: hunger, collision check straight ahead, decide (reversals ignored),
    /// collision check of the chosen cell, move, eat, fitness. A death of either
    /// kind leaves the body and the move counter where they were and tells the
    /// environment the turn is over.
    pub fn tick<E: GameEnvironment + ?Sized>(&mut self, env: &mut E) -> TickOutcome {
        // dead snakes are frozen
        if let Some(cause) = self.death {
            return TickOutcome::Died(cause);
        }

        // 1. hunger
        self.left_to_live -= 1;
        if self.left_to_live < 0 {
            return self.die(DeathCause::Starvation, env);
        }

        // 2. the cell we are heading into
        let intended = self.head + self.heading.delta();
        if self.collides(&*env, intended) {
            return self.die(DeathCause::Collision, env);
        }

        // 3. look and decide; a 180° request keeps the current heading
        let features = game_input::look(self, &*env);
        let choice = Heading::from_index(self.brain.decide(&features)).unwrap_or(self.heading);
        if choice != self.heading.opposite() {
            self.heading = choice;
        }

        // 4. a turn may point somewhere blocked
        let target = self.head + self.heading.delta();
        if target != intended && self.collides(&*env, target) {
            return self.die(DeathCause::Collision, env);
        }

        // 5. the step counts only once it is actually taken
        self.moves += 1;
        let vacated = self.step_to(target);

        // 6. apple: grow into the vacated cell, refuel, replace the apple
        let mut outcome = TickOutcome::Moved;
        if env.is_occupied(target) == Cell::Apple {
            env.remove_apple(target);
            self.tail.push_front(vacated);
            self.left_to_live += self.hunger.apple_bonus as i64;
            env.notify_score_increment();
            env.place_apple(&self.cells());
            outcome = TickOutcome::Ate;
        }

        // 7. fitness
        self.fitness = fitness_for(self.moves, self.tail.len());
        outcome
    }

    fn collides<E: GameEnvironment + ?Sized>(&self, env: &E, p: Position) -> bool {
        matches!(self.cell_at(env, p), Cell::Wall | Cell::Tail)
    }

    /// Every segment takes the place of the one ahead of it, the head steps to
    /// `target`. Returns the cell the tip left.
    fn step_to(&mut self, target: Position) -> Position {
        let vacated = match self.tail.pop_front() {
            Some(tip) => {
                self.tail.push_back(self.head);
                tip
            }
            None => self.head,
        };
        self.head = target;
        vacated
    }

    fn die<E: GameEnvironment + ?Sized>(&mut self, cause: DeathCause, env: &mut E) -> TickOutcome {
        self.alive = false;
        self.death = Some(cause);
        self.fitness = fitness_for(self.moves, self.tail.len());
        trace!(?cause, moves = self.moves, tail = self.tail.len(), fitness = self.fitness, "snake died");
        env.notify_game_over();
        TickOutcome::Died(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_rng;

    /// Open field of the given size with fixed apples; counts notifications.
    #[derive(Default)]
    struct Field {
        width: i32,
        height: i32,
        apples: Vec<Position>,
        respawns: usize,
        score: u32,
        game_overs: u32,
    }

    impl Field {
        fn new(width: i32, height: i32) -> Self {
            Self { width, height, ..Default::default() }
        }
    }

    impl GameEnvironment for Field {
        fn is_occupied(&self, p: Position) -> Cell {
            if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
                Cell::Wall
            } else if self.apples.contains(&p) {
                Cell::Apple
            } else {
                Cell::Empty
            }
        }
        fn place_apple(&mut self, _: &[Position]) {
            self.respawns += 1;
        }
        fn remove_apple(&mut self, p: Position) {
            self.apples.retain(|&a| a != p);
        }
        fn notify_score_increment(&mut self) {
            self.score += 1;
        }
        fn notify_game_over(&mut self) {
            self.game_overs += 1;
        }
    }

    /// Brain whose output layer always prefers `heading`.
    fn steering(heading: Heading) -> NeuralBrain {
        let mut record = NeuralBrain::random(&mut create_rng(42)).to_record();
        let last = record.weights.len() - 1;
        for row in &mut record.weights[last] {
            row.fill(0.0);
        }
        let bias = &mut record.biases[last];
        bias.fill(-10.0);
        bias[Heading::ALL.iter().position(|&h| h == heading).unwrap()] = 10.0;
        NeuralBrain::from_record(&record).unwrap()
    }

    #[test]
    fn fitness_is_monotone() {
        assert_eq!(fitness_for(0, 5), 0.0);
        assert!(fitness_for(11, 2) > fitness_for(10, 2));
        assert!(fitness_for(10, 3) >= fitness_for(10, 2));
        assert!(fitness_for(10, 10_000).is_finite());
    }

    #[test]
    fn moves_forward_and_body_follows() {
        let mut field = Field::new(40, 40);
        let mut snake = SmartSnake::new(steering(Heading::Right), Hunger::default());
        assert_eq!(snake.tick(&mut field), TickOutcome::Moved);
        assert_eq!(snake.head(), Position::new(6, 5));
        assert_eq!(snake.tail().collect::<Vec<_>>(), vec![Position::new(4, 5), Position::new(5, 5)]);
        assert_eq!(snake.moves(), 1);
        assert_eq!(snake.fitness(), fitness_for(1, 2));
    }

    #[test]
    fn reversal_requests_are_ignored() {
        let mut field = Field::new(40, 40);
        let mut snake = SmartSnake::new(steering(Heading::Left), Hunger::default());
        snake.tick(&mut field);
        assert_eq!(snake.heading(), Heading::Right);
        assert_eq!(snake.head(), Position::new(6, 5));
        assert!(snake.is_alive());
    }

    #[test]
    fn turns_take_effect_on_the_same_tick() {
        let mut field = Field::new(40, 40);
        let mut snake = SmartSnake::new(steering(Heading::Up), Hunger::default());
        snake.tick(&mut field);
        assert_eq!(snake.heading(), Heading::Up);
        assert_eq!(snake.head(), Position::new(5, 4));
    }

    #[test]
    fn eating_grows_refuels_and_notifies() {
        let mut field = Field::new(40, 40);
        field.apples.push(Position::new(6, 5));
        let mut snake = SmartSnake::new(steering(Heading::Right), Hunger::default());
        assert_eq!(snake.tick(&mut field), TickOutcome::Ate);
        assert_eq!(snake.tail_len(), 3);
        assert_eq!(snake.tail().next(), Some(Position::new(3, 5)));
        assert_eq!(snake.left_to_live(), 200 - 1 + 100);
        assert_eq!((field.score, field.respawns), (1, 1));
        assert!(field.apples.is_empty());
        assert_eq!(snake.fitness(), fitness_for(1, 3));
    }

    #[test]
    fn starves_when_budget_runs_out() {
        let mut field = Field::new(1000, 10);
        let hunger = Hunger { initial: 3, apple_bonus: 0 };
        let mut snake = SmartSnake::new(steering(Heading::Right), hunger);
        for _ in 0..3 {
            assert_eq!(snake.tick(&mut field), TickOutcome::Moved);
        }
        assert_eq!(snake.tick(&mut field), TickOutcome::Died(DeathCause::Starvation));
        assert_eq!(snake.moves(), 3);
        assert_eq!(field.game_overs, 1);
        // dead snakes stay dead and do not notify again
        assert_eq!(snake.tick(&mut field), TickOutcome::Died(DeathCause::Starvation));
        assert_eq!(field.game_overs, 1);
    }

    #[test]
    fn running_into_own_tail_is_a_collision() {
        let mut field = Field::new(40, 40);
        let tail = vec![
            Position::new(4, 6),
            Position::new(5, 6),
            Position::new(6, 6),
            Position::new(6, 5),
        ];
        let mut snake = SmartSnake::with_body(steering(Heading::Down), Hunger::default(), Position::new(5, 5), tail, Heading::Left);
        // straight ahead (4, 5) is free, the requested turn lands on (5, 6)
        assert_eq!(snake.tick(&mut field), TickOutcome::Died(DeathCause::Collision));
        assert_eq!(snake.head(), Position::new(5, 5));
        assert_eq!(snake.moves(), 0);
        assert_eq!(snake.fitness(), 0.0);
        assert_eq!(field.game_overs, 1);
    }

    #[test]
    fn wall_death_counts_the_same_straight_or_after_a_turn() {
        // heading straight off the top edge
        let mut straight_field = Field::new(10, 10);
        let mut straight = SmartSnake::with_body(
            steering(Heading::Up),
            Hunger::default(),
            Position::new(5, 0),
            vec![Position::new(5, 2), Position::new(5, 1)],
            Heading::Up,
        );
        // free cell ahead, but the brain turns off the top edge
        let mut turn_field = Field::new(10, 10);
        let mut turned = SmartSnake::with_body(
            steering(Heading::Up),
            Hunger::default(),
            Position::new(5, 0),
            vec![Position::new(3, 0), Position::new(4, 0)],
            Heading::Right,
        );

        assert_eq!(straight.tick(&mut straight_field), TickOutcome::Died(DeathCause::Collision));
        assert_eq!(turned.tick(&mut turn_field), TickOutcome::Died(DeathCause::Collision));
        for snake in [&straight, &turned] {
            assert!(!snake.is_alive());
            assert_eq!(snake.moves(), 0);
            assert_eq!(snake.fitness(), 0.0);
            assert_eq!(snake.head(), Position::new(5, 0));
        }
        assert_eq!(turned.heading(), Heading::Up);
        assert_eq!((straight_field.game_overs, turn_field.game_overs), (1, 1));
    }

    #[test]
    fn heading_index_past_the_end_is_none() {
        assert_eq!(Heading::from_index(0), Some(Heading::Up));
        assert_eq!(Heading::from_index(3), Some(Heading::Right));
        assert_eq!(Heading::from_index(4), None);
    }
}
