use crate::db::{BrainRecord, StoreError};
use crate::game_input::FEATURE_COUNT;
use crate::matrix::{Matrix, add_assign, sigmoid};
use crate::utils::has_non_finite;
use rand::Rng;
use rand_distr::{Normal, NormalError, StandardNormal};
use thiserror::Error;

pub const INPUTS: usize = FEATURE_COUNT;
pub const H1: usize = 16;
pub const H2: usize = 16;
pub const OUTPUTS: usize = 4;

/// Layer widths, input first. Baked into `BRAIN_VERSION`: changing either means old saves no longer load.
pub const TOPOLOGY: [usize; 4] = [INPUTS, H1, H2, OUTPUTS];
pub const BRAIN_VERSION: u32 = 1;

/// One fully connected layer: `outputs × inputs` weights plus one bias per output.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    weights: Matrix,
    bias: Vec<f32>,
}

impl Layer {
    fn random<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let weights = Matrix::random(outputs, inputs, &StandardNormal, rng);
        let bias = (0..outputs).map(|_| rng.sample(StandardNormal)).collect();
        Self { weights, bias }
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut z = self.weights.mul_vec(input);
        add_assign(&mut z, &self.bias);
        for v in &mut z {
            *v = sigmoid(*v);
        }
        z
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }
}

/// Per-scalar mutation policy: with probability `rate` add `Normal(mu, sigma) * scale`.
#[derive(Copy, Clone, Debug)]
pub struct Mutation {
    rate: f64,
    noise: Normal<f32>,
    scale: f32,
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("mutation rate must be within [0, 1], got {0}")]
    Rate(f64),
    #[error("mutation noise: {0}")]
    Noise(#[from] NormalError),
}

impl Mutation {
    pub fn new(rate: f64, mu: f32, sigma: f32, scale: f32) -> Result<Self, MutationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(MutationError::Rate(rate));
        }
        Ok(Self { rate, noise: Normal::new(mu, sigma)?, scale })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn perturb<R: Rng + ?Sized>(&self, values: &mut [f32], rng: &mut R) {
        for v in values {
            if rng.gen_bool(self.rate) {
                *v += rng.sample(self.noise) * self.scale;
            }
        }
    }
}

/// Feedforward network `input → hidden1 → hidden2 → output`, sigmoid on every layer.
///
/// `Clone` is a deep copy: a clone owns its own parameter storage.
#[derive(Clone, Debug, PartialEq)]
pub struct NeuralBrain {
    layers: Vec<Layer>,
}

impl NeuralBrain {
    /// Standard-normal weights and biases.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let layers = TOPOLOGY
            .windows(2)
            .map(|w| Layer::random(w[0], w[1], rng))
            .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Total number of weights and biases.
    pub fn parameter_count() -> usize {
        TOPOLOGY.windows(2).map(|w| w[0] * w[1] + w[1]).sum()
    }

    /// One score in (0, 1) per candidate heading, in the order Up, Down, Left, Right.
    pub fn analyze(&self, input: &[f32]) -> [f32; OUTPUTS] {
        assert_eq!(input.len(), INPUTS, "brain expects {INPUTS} inputs, got {}", input.len());
        let activations = self
            .layers
            .iter()
            .fold(input.to_vec(), |acc, layer| layer.forward(&acc));
        let mut out = [0.0f32; OUTPUTS];
        out.copy_from_slice(&activations);
        out
    }

    /// Index of the strongest output; ties go to the lowest index.
    pub fn decide(&self, input: &[f32]) -> usize {
        let output = self.analyze(input);
        let mut best = 0;
        for i in 1..OUTPUTS {
            if output[i] > output[best] {
                best = i;
            }
        }
        best
    }

    /// In-place perturbation of every weight and bias, each selected independently.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, mutation: &Mutation) {
        for layer in &mut self.layers {
            mutation.perturb(layer.weights.as_mut_slice(), rng);
            mutation.perturb(&mut layer.bias, rng);
        }
    }

    /// Child brain from `self` and `other`.
    ///
    /// With probability `crossover_rate` each weight matrix and bias vector takes a
    /// contiguous row-major band from `self` and everything else from `other`;
    /// otherwise the child is a copy of `self`. Draw order: one bool for the rate,
    /// then per layer `r0, r1, c0, c1` for the weights followed by the same four
    /// for the bias (an `n × 1` column).
    pub fn crossover<R: Rng + ?Sized>(&self, other: &NeuralBrain, rng: &mut R, crossover_rate: f64) -> NeuralBrain {
        assert_eq!(self.layers.len(), other.layers.len(), "crossover between different layer counts");
        let mut child = self.clone();
        if !rng.gen_bool(crossover_rate) {
            return child;
        }
        for (mine, theirs) in child.layers.iter_mut().zip(&other.layers) {
            assert_eq!(
                mine.weights.shape(),
                theirs.weights.shape(),
                "crossover between mismatched weight shapes"
            );
            let (rows, cols) = mine.weights.shape();
            band_crossover(mine.weights.as_mut_slice(), theirs.weights.as_slice(), rows, cols, rng);
            let len = mine.bias.len();
            band_crossover(&mut mine.bias, &theirs.bias, len, 1, rng);
        }
        child
    }

    pub fn to_record(&self) -> BrainRecord {
        BrainRecord {
            version: BRAIN_VERSION,
            layer_shapes: self.layers.iter().map(|l| l.weights.shape()).collect(),
            weights: self.layers.iter().map(|l| l.weights.to_rows()).collect(),
            biases: self.layers.iter().map(|l| l.bias.clone()).collect(),
        }
    }

    /// Rebuild a brain from a stored record.
    ///
    /// The version tag and every array shape must match the compiled topology
    /// exactly; anything else is a `VersionMismatch`.
    pub fn from_record(record: &BrainRecord) -> Result<Self, StoreError> {
        let expected: Vec<(usize, usize)> = TOPOLOGY.windows(2).map(|w| (w[1], w[0])).collect();
        if record.version != BRAIN_VERSION || record.layer_shapes != expected {
            return Err(StoreError::VersionMismatch {
                expected: topology_tag(BRAIN_VERSION, &expected),
                found: topology_tag(record.version, &record.layer_shapes),
            });
        }
        if record.weights.len() != expected.len() || record.biases.len() != expected.len() {
            return Err(shape_mismatch(record, &expected));
        }

        let mut layers = Vec::with_capacity(expected.len());
        for ((rows, bias), &(out, inp)) in record.weights.iter().zip(&record.biases).zip(&expected) {
            let weights = Matrix::from_rows(rows)
                .filter(|m| m.shape() == (out, inp))
                .ok_or_else(|| shape_mismatch(record, &expected))?;
            if bias.len() != out {
                return Err(shape_mismatch(record, &expected));
            }
            if has_non_finite(weights.as_slice()) || has_non_finite(bias) {
                return Err(StoreError::Corrupt("non-finite brain parameter".into()));
            }
            layers.push(Layer { weights, bias: bias.clone() });
        }
        Ok(Self { layers })
    }
}

/// Keep the flat range `[r0*cols + c0, r1*cols + c1]` of `child`, take the rest from `other`.
fn band_crossover<R: Rng + ?Sized>(child: &mut [f32], other: &[f32], rows: usize, cols: usize, rng: &mut R) {
    assert_eq!(child.len(), other.len(), "crossover between mismatched shapes");
    assert_eq!(child.len(), rows * cols, "crossover shape does not match storage");
    if child.is_empty() {
        return;
    }
    let r0 = rng.gen_range(0..rows);
    let r1 = rng.gen_range(r0..rows);
    let c0 = rng.gen_range(0..cols);
    let c1 = if r1 == r0 { rng.gen_range(c0..cols) } else { rng.gen_range(0..cols) };
    let keep = r0 * cols + c0..=r1 * cols + c1;
    for (i, (c, o)) in child.iter_mut().zip(other).enumerate() {
        if !keep.contains(&i) {
            *c = *o;
        }
    }
}

fn topology_tag(version: u32, shapes: &[(usize, usize)]) -> String {
    let dims: Vec<String> = shapes.iter().map(|(r, c)| format!("{r}x{c}")).collect();
    format!("v{version} [{}]", dims.join(", "))
}

fn shape_mismatch(record: &BrainRecord, expected: &[(usize, usize)]) -> StoreError {
    let found: Vec<(usize, usize)> = record
        .weights
        .iter()
        .map(|rows| (rows.len(), rows.first().map_or(0, Vec::len)))
        .collect();
    StoreError::VersionMismatch {
        expected: topology_tag(BRAIN_VERSION, expected),
        found: topology_tag(record.version, &found),
    }
}
