//! Distances between column `i` of `A` and column `j` of `B`.
//!
//! Every metric follows the "smaller is more similar" convention so that
//! nearest-neighbor search is a plain minimum scan.

use crate::error::{FaceCoreError, Result};
use crate::linalg::NumericPolicy;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean distance, `sqrt(L2)`.
    L1,
    /// Squared Euclidean distance.
    L2,
    /// Negated cosine similarity, in `[-1, 1]`.
    Cosine,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::L1 => "L1",
            Metric::L2 => "L2",
            Metric::Cosine => "COS",
        };
        f.write_str(s)
    }
}

fn columns<'a>(a: &'a Matrix, i: usize, b: &'a Matrix, j: usize) -> Result<(&'a [f64], &'a [f64])> {
    if a.rows() != b.rows() {
        return Err(FaceCoreError::InvalidDimensions(format!(
            "distance between columns of {} and {} rows",
            a.rows(),
            b.rows()
        )));
    }
    a.check_column(i)?;
    b.check_column(j)?;
    Ok((a.column(i), b.column(j)))
}

fn squared_euclidean(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
}

fn negated_cosine(x: &[f64], y: &[f64]) -> f64 {
    let dot: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let nx = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    let ny = y.iter().map(|v| v * v).sum::<f64>().sqrt();
    -dot / (nx * ny)
}

impl Metric {
    /// Distance under the legacy contract: zero-norm cosines come back as NaN.
    pub fn distance(self, a: &Matrix, i: usize, b: &Matrix, j: usize) -> Result<f64> {
        self.distance_with(a, i, b, j, NumericPolicy::Propagate)
    }

    /// Distance with an explicit policy for NaN results.
    pub fn distance_with(
        self,
        a: &Matrix,
        i: usize,
        b: &Matrix,
        j: usize,
        policy: NumericPolicy,
    ) -> Result<f64> {
        let (x, y) = columns(a, i, b, j)?;
        let d = match self {
            Metric::L1 => squared_euclidean(x, y).sqrt(),
            Metric::L2 => squared_euclidean(x, y),
            Metric::Cosine => negated_cosine(x, y),
        };
        if d.is_nan() && policy == NumericPolicy::Strict {
            return Err(FaceCoreError::numeric(
                "distance",
                format!("{} between column {} and column {} is NaN", self, i, j),
            ));
        }
        Ok(d)
    }
}

pub fn dist_l1(a: &Matrix, i: usize, b: &Matrix, j: usize) -> Result<f64> {
    Metric::L1.distance(a, i, b, j)
}

pub fn dist_l2(a: &Matrix, i: usize, b: &Matrix, j: usize) -> Result<f64> {
    Metric::L2.distance(a, i, b, j)
}

pub fn dist_cos(a: &Matrix, i: usize, b: &Matrix, j: usize) -> Result<f64> {
    Metric::Cosine.distance(a, i, b, j)
}
