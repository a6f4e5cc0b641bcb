//! Fixed-shape row-major matrix and the handful of vector ops the brain needs.
//!
//! Shapes never change after construction. Every operation that combines two
//! operands asserts their shapes agree.

use rand::Rng;
use rand_distr::Distribution;

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Every entry drawn independently from `dist`.
    pub fn random<D, R>(rows: usize, cols: usize, dist: &D, rng: &mut R) -> Self
    where
        D: Distribution<f32>,
        R: Rng + ?Sized,
    {
        Self::from_fn(rows, cols, |_, _| dist.sample(rng))
    }

    /// Build from nested rows. `None` when the rows are ragged.
    pub fn from_rows(rows: &[Vec<f32>]) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        let data = rows.iter().flatten().copied().collect();
        Some(Self { rows: rows.len(), cols, data })
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        if self.cols == 0 {
            return vec![Vec::new(); self.rows];
        }
        self.data.chunks(self.cols).map(<[f32]>::to_vec).collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) outside {:?}", self.shape());
        self.data[row * self.cols + col]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// `self · v`
    pub fn mul_vec(&self, v: &[f32]) -> Vec<f32> {
        assert_eq!(
            v.len(),
            self.cols,
            "matrix {:?} cannot multiply vector of length {}",
            self.shape(),
            v.len()
        );
        if self.cols == 0 {
            return vec![0.0; self.rows];
        }
        self.data.chunks(self.cols).map(|row| dot(row, v)).collect()
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot of mismatched lengths {} and {}", a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Element-wise `a += b`.
pub fn add_assign(a: &mut [f32], b: &[f32]) {
    assert_eq!(a.len(), b.len(), "add of mismatched lengths {} and {}", a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

/// Logistic function, kept strictly inside (0, 1) so saturated units stay
/// distinguishable from the bounds.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    let y = 1.0 / (1.0 + (-f64::from(x)).exp());
    (y as f32).clamp(f32::EPSILON, 1.0 - f32::EPSILON)
}
