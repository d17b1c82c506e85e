//! Regime-shift matrix: a square matrix over time steps which stores the step-to-step
//! change of a series on its super-diagonal.
//! Note that it is NOT a transition probability matrix; rows do not sum to one.
use crate::error::{HmmClimateError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeShiftMatrix {
    dim: usize,
    // Row-major. By accessing i * dim + j, we get the (i,j) cell.
    data: Vec<f64>,
}

impl RegimeShiftMatrix {
    /// (i, i+1) = series[i+1] - series[i], zero elsewhere.
    /// A series of length one gives a 1x1 zero matrix.
    pub fn new(series: &[f64]) -> Result<Self> {
        if series.is_empty() {
            return Err(HmmClimateError::invalid(
                "regime-shift matrix of an empty series",
            ));
        }
        let dim = series.len();
        let mut data = vec![0f64; dim * dim];
        for (i, w) in series.windows(2).enumerate() {
            data[i * dim + i + 1] = w[1] - w[0];
        }
        Ok(Self { dim, data })
    }
    pub fn dim(&self) -> usize {
        self.dim
    }
    /// Return 0 for cells outside of the matrix.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < self.dim && j < self.dim {
            self.data[i * self.dim + j]
        } else {
            0f64
        }
    }
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.dim)
    }
    /// Non-zero cells as (row, column, value).
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let dim = self.dim;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, x)| **x != 0f64)
            .map(move |(idx, &x)| (idx / dim, idx % dim, x))
    }
}

impl std::fmt::Display for RegimeShiftMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.rows() {
            let row: Vec<_> = row.iter().map(|x| format!("{:.1}", x)).collect();
            writeln!(f, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}
