use crate::brain::{BRAIN_VERSION, Mutation, NeuralBrain};
use crate::db::{GenerationRecord, GenerationStore, StoreError, WriteBehind};
use crate::snake::{Hunger, SmartSnake};
use crate::utils::{SimRng, vec_stats};
use rand::Rng;
use std::mem;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How a generation is bred.
#[derive(Copy, Clone, Debug)]
pub struct Breeding {
    pub size: usize,
    pub mutation: Mutation,
    pub crossover_rate: f64,
    pub hunger: Hunger,
}

/// Summary of a finished generation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GenerationStats {
    pub generation_id: u32,
    pub population_size: usize,
    pub total_fitness: f64,
    pub mean_fitness: f64,
    pub elite_fitness: f64,
    pub elite_moves: u64,
    pub elite_tail: usize,
}

/// What `advance` did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Advance {
    /// Index of the agent whose turn it is now.
    NextAgent(usize),
    /// The generation finished and the next one was bred.
    NewGeneration(GenerationStats),
}

/// Fitness-proportionate (roulette) pick over `fitness`.
///
/// Falls back to a uniform pick when the total is zero or not finite.
pub fn select_index<R: Rng + ?Sized>(fitness: &[f64], rng: &mut R) -> usize {
    assert!(!fitness.is_empty(), "cannot select from an empty pool");
    let total: f64 = fitness.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return rng.gen_range(0..fitness.len());
    }
    let target = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, f) in fitness.iter().enumerate() {
        cumulative += f;
        if cumulative > target {
            return i;
        }
    }
    fitness.len() - 1
}

/// Fixed-size population played one agent at a time.
pub struct Population {
    agents: Vec<SmartSnake>,
    generation_id: u32,
    current: usize,
    done: bool,
    elite: Option<SmartSnake>,
    breeding: Breeding,
    rng: SimRng,
    writer: Option<WriteBehind>,
    save_whole_generation: bool,
}

impl Population {
    pub fn random(breeding: Breeding, mut rng: SimRng) -> Self {
        let agents = (0..breeding.size)
            .map(|_| SmartSnake::random(&mut rng, breeding.hunger))
            .collect();
        Self::with_agents(agents, 0, breeding, rng)
    }

    fn with_agents(agents: Vec<SmartSnake>, generation_id: u32, breeding: Breeding, rng: SimRng) -> Self {
        Self {
            agents,
            generation_id,
            current: 0,
            done: false,
            elite: None,
            breeding,
            rng,
            writer: None,
            save_whole_generation: true,
        }
    }

    /// Persist every finished generation in the background.
    pub fn with_writer(mut self, writer: WriteBehind, save_whole_generation: bool) -> Self {
        self.writer = Some(writer);
        self.save_whole_generation = save_whole_generation;
        self
    }

    /// Resume from a saved generation.
    ///
    /// Nothing is bred here: generation N's brains are played again, unchanged,
    /// as generation N + 1 and only get re-scored there. The elite comes first
    /// and the copy of it inside `brains` is skipped, as is any other brain
    /// identical to it. A record holding only the elite is topped up with
    /// mutated copies of it; brains beyond the configured size are dropped.
    pub fn from_record(record: &GenerationRecord, breeding: Breeding, mut rng: SimRng) -> Result<Self, StoreError> {
        let elite = NeuralBrain::from_record(&record.elite_brain)?;
        // every stored brain is checked, one bad one fails the whole load
        let mut brains = vec![elite.clone()];
        for stored in &record.brains {
            let brain = NeuralBrain::from_record(stored)?;
            if brain != elite {
                brains.push(brain);
            }
        }
        brains.truncate(breeding.size);
        // elite-only saves: fill up with mutated copies of the elite
        while brains.len() < breeding.size {
            let mut copy = elite.clone();
            copy.mutate(&mut rng, &breeding.mutation);
            brains.push(copy);
        }

        let agents = brains.into_iter().map(|b| SmartSnake::new(b, breeding.hunger)).collect();
        let mut population = Self::with_agents(agents, record.generation_id + 1, breeding, rng);
        population.elite = Some(SmartSnake::new(elite, breeding.hunger));
        info!(
            generation = population.generation_id,
            saved_generation = record.generation_id,
            elite_fitness = record.elite_fitness,
            "resumed population"
        );
        Ok(population)
    }

    /// Load the newest saved generation.
    pub fn load(store: &GenerationStore, breeding: Breeding, rng: SimRng) -> Result<Self, StoreError> {
        let record = store.load_latest()?;
        Self::from_record(&record, breeding, rng)
    }

    /// Write the current agents as generation `generation_id`, synchronously.
    pub fn save(&self, store: &GenerationStore, generation_id: u32) -> Result<PathBuf, StoreError> {
        let fitness: Vec<f64> = self.agents.iter().map(SmartSnake::fitness).collect();
        let elite = best_index(&fitness);
        store.save(&snapshot(&self.agents, elite, generation_id, true))
    }

    pub fn agents(&self) -> &[SmartSnake] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn generation_id(&self) -> u32 {
        self.generation_id
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_agent(&self) -> &SmartSnake {
        &self.agents[self.current]
    }

    pub fn current_agent_mut(&mut self) -> &mut SmartSnake {
        &mut self.agents[self.current]
    }

    /// Best agent of the previous generation.
    pub fn elite(&self) -> Option<&SmartSnake> {
        self.elite.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Call when the current agent's turn is over.
    pub fn advance(&mut self) -> Advance {
        // agents play one after another, so the last turn ends the generation
        if self.current + 1 < self.agents.len() {
            self.current += 1;
            return Advance::NextAgent(self.current);
        }
        let still_alive = self.agents.iter().filter(|a| a.is_alive()).count();
        if still_alive > 0 {
            warn!(still_alive, "generation ended with live agents, scoring them as they are");
        }
        self.done = true;
        Advance::NewGeneration(self.reproduce())
    }

    /// Breed the next generation from the finished one.
    ///
    /// Slot 0 is a fresh copy of the best agent; every other child is the
    /// crossover of two roulette-selected parents followed by mutation. The
    /// finished generation is handed to the background writer after the swap.
    pub fn reproduce(&mut self) -> GenerationStats {
        // score the finished generation
        let fitness: Vec<f64> = self.agents.iter().map(SmartSnake::fitness).collect();
        let elite = best_index(&fitness);
        let stats = vec_stats(&fitness);
        if !(stats.sum > 0.0) {
            debug!(generation = self.generation_id, "all fitness zero, selecting uniformly");
        }

        // elitism: the best brain goes on untouched
        let mut next = Vec::with_capacity(self.breeding.size);
        next.push(self.agents[elite].fresh_clone());
        // the rest: two roulette parents (with replacement), crossover, mutate
        while next.len() < self.breeding.size {
            let a = select_index(&fitness, &mut self.rng);
            let b = select_index(&fitness, &mut self.rng);
            let mut child = self.agents[a].crossover(&self.agents[b], &mut self.rng, self.breeding.crossover_rate);
            child.mutate(&mut self.rng, &self.breeding.mutation);
            next.push(child);
        }

        // swap first, the old agents are only read from here on
        let finished = mem::replace(&mut self.agents, next);
        let finished_id = self.generation_id;
        let summary = GenerationStats {
            generation_id: finished_id,
            population_size: finished.len(),
            total_fitness: stats.sum,
            mean_fitness: stats.mean,
            elite_fitness: fitness[elite],
            elite_moves: finished[elite].moves(),
            elite_tail: finished[elite].tail_len(),
        };
        self.elite = Some(finished[elite].clone());
        // back to Running(0) of the new generation
        self.generation_id += 1;
        self.current = 0;
        self.done = false;

        info!(
            generation = finished_id,
            elite_fitness = summary.elite_fitness,
            mean_fitness = summary.mean_fitness,
            "new generation {} of snakes",
            self.generation_id
        );

        // the writer owns its snapshot, the new generation can start right away
        if let Some(writer) = self.writer.as_mut() {
            writer.submit(snapshot(&finished, elite, finished_id, self.save_whole_generation));
        }
        summary
    }

    /// Wait for the last background save.
    pub fn flush(&mut self) -> Option<Result<PathBuf, StoreError>> {
        self.writer.as_mut().and_then(WriteBehind::wait)
    }
}

fn snapshot(agents: &[SmartSnake], elite: usize, generation_id: u32, whole: bool) -> GenerationRecord {
    GenerationRecord {
        version: BRAIN_VERSION,
        generation_id,
        population_size: agents.len(),
        total_fitness: agents.iter().map(SmartSnake::fitness).sum(),
        elite_fitness: agents[elite].fitness(),
        elite_brain: agents[elite].brain().to_record(),
        brains: if whole {
            agents.iter().map(|a| a.brain().to_record()).collect()
        } else {
            Vec::new()
        },
    }
}

/// Index of the highest fitness; the first one wins ties.
fn best_index(fitness: &[f64]) -> usize {
    let mut best = 0;
    for (i, &f) in fitness.iter().enumerate() {
        if f > fitness[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_rng;

    fn breeding(size: usize) -> Breeding {
        Breeding {
            size,
            mutation: Mutation::new(0.01, 0.0, 1.0, 0.2).unwrap(),
            crossover_rate: 0.8,
            hunger: Hunger::default(),
        }
    }

    fn finish_with(population: &mut Population, fitness: &[f64]) {
        for (agent, &f) in population.agents.iter_mut().zip(fitness) {
            agent.fitness = f;
        }
    }

    #[test]
    fn roulette_stays_in_range_and_follows_weights() {
        let mut rng = create_rng(1);
        let fitness = [0.0, 0.0, 10.0, 0.0];
        for _ in 0..200 {
            assert_eq!(select_index(&fitness, &mut rng), 2);
        }
        let fitness = [1.0, 3.0];
        let picks = (0..4000).filter(|_| select_index(&fitness, &mut rng) == 1).count();
        assert!((2700..3300).contains(&picks), "{picks}");
    }

    #[test]
    fn roulette_with_zero_total_is_uniform() {
        let mut rng = create_rng(2);
        let mut seen = [false; 5];
        for _ in 0..500 {
            let i = select_index(&[0.0; 5], &mut rng);
            assert!(i < 5);
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn advance_walks_agents_then_breeds() {
        let mut population = Population::random(breeding(3), create_rng(3));
        assert_eq!(population.advance(), Advance::NextAgent(1));
        assert_eq!(population.advance(), Advance::NextAgent(2));
        match population.advance() {
            Advance::NewGeneration(stats) => assert_eq!(stats.generation_id, 0),
            other => panic!("expected a new generation, got {other:?}"),
        }
        assert_eq!(population.generation_id(), 1);
        assert_eq!(population.current_index(), 0);
        assert!(!population.is_done());
        assert_eq!(population.len(), 3);
    }

    #[test]
    fn elite_brain_is_carried_unmodified() {
        let mut population = Population::random(breeding(8), create_rng(4));
        finish_with(&mut population, &[1.0, 5.0, 2.0, 90.0, 0.0, 3.0, 3.0, 1.0]);
        let best = population.agents[3].brain().clone();
        let stats = population.reproduce();
        assert_eq!(stats.elite_fitness, 90.0);
        assert_eq!(stats.total_fitness, 105.0);
        assert_eq!(population.agents[0].brain(), &best);
        assert_eq!(population.elite().unwrap().brain(), &best);
        assert!(population.agents.iter().all(|a| a.is_alive() && a.moves() == 0));
    }

    #[test]
    fn all_zero_fitness_still_fills_the_generation() {
        let mut population = Population::random(breeding(4), create_rng(5));
        finish_with(&mut population, &[0.0; 4]);
        let stats = population.reproduce();
        assert_eq!(stats.total_fitness, 0.0);
        assert_eq!(population.len(), 4);
    }

    #[test]
    fn from_record_tops_up_an_elite_only_save() {
        let mut population = Population::random(breeding(4), create_rng(6));
        finish_with(&mut population, &[0.0, 7.0, 0.0, 0.0]);
        let record = snapshot(&population.agents, 1, 12, false);
        let restored = Population::from_record(&record, breeding(6), create_rng(7)).unwrap();
        assert_eq!(restored.generation_id(), 13);
        assert_eq!(restored.len(), 6);
        assert_eq!(restored.agents()[0].brain(), population.agents[1].brain());
    }

    #[test]
    fn resumed_generation_replays_saved_brains_without_duplicating_the_elite() {
        let mut population = Population::random(breeding(3), create_rng(8));
        finish_with(&mut population, &[4.0, 9.0, 1.0]);
        let mut record = snapshot(&population.agents, 1, 5, true);
        // a second copy of the elite, as a previous elitism step leaves behind
        record.brains.push(record.elite_brain.clone());

        let restored = Population::from_record(&record, breeding(3), create_rng(9)).unwrap();

        let brains: Vec<&NeuralBrain> = restored.agents().iter().map(SmartSnake::brain).collect();
        assert_eq!(brains, vec![population.agents[1].brain(), population.agents[0].brain(), population.agents[2].brain()]);
        assert!(restored.agents().iter().all(|a| a.fitness() == 0.0 && a.is_alive()));
        assert_eq!(restored.generation_id(), 6);
    }
}
