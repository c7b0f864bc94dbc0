//! Neighborhood equations: one sparse row per point expressing it as the
//! uniform average of its most similar neighbors, plus one anchor row per
//! landmark.
//!
//! Columns `0..n_points` are the input points and columns
//! `n_points..n_points + n_landmarks` are the landmark centroids. Rows follow the
//! same order, so row `i` always constrains column `i`. The coefficient matrix
//! is built once and shared by every axis; only [`EquationSystem::rhs_for_axis`]
//! differs between solves.

use crate::error::LayoutError;
use crate::error::Result;
use crate::similarity::SimilarityMatrix;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use sprs::CsMat;
use sprs::TriMat;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationKind {
  /// `x_i - (1/count) Σ x_j = 0` over the `count` nearest neighbors.
  Neighborhood,
  /// No neighbor passed the threshold: `x_i = 0`.
  Isolated,
  /// `x_landmark = coordinate`, with the coordinate supplied per axis.
  Anchor { landmark: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
  pub row: usize,
  pub kind: EquationKind,
  /// Column carrying the +1 coefficient.
  pub self_column: usize,
  /// `(column, coefficient)` for every neighbor, ascending by column. Empty
  /// unless `kind` is `Neighborhood`.
  pub neighbors: Vec<(usize, f64)>,
}

impl Equation {
  /// Sum of the neighbor coefficients; -1 for neighborhood rows, 0 otherwise.
  pub fn neighbor_sum(&self) -> f64 {
    self.neighbors.iter().map(|&(_, c)| c).sum()
  }
}

/// The shared coefficient structure of both axis solves.
#[derive(Debug, Clone)]
pub struct EquationSystem {
  equations: Vec<Equation>,
  matrix: CsMat<f64>,
  n_points: usize,
  n_landmarks: usize,
  isolated: Vec<usize>,
}

impl EquationSystem {
  pub fn n_points(&self) -> usize {
    self.n_points
  }

  pub fn n_landmarks(&self) -> usize {
    self.n_landmarks
  }

  pub fn n_unknowns(&self) -> usize {
    self.n_points + self.n_landmarks
  }

  pub fn n_equations(&self) -> usize {
    self.equations.len()
  }

  pub fn equations(&self) -> &[Equation] {
    &self.equations
  }

  /// CSR coefficient matrix, `n_equations × n_unknowns`.
  pub fn matrix(&self) -> &CsMat<f64> {
    &self.matrix
  }

  /// Point rows that received the self-only equation, ascending.
  pub fn isolated(&self) -> &[usize] {
    &self.isolated
  }

  /// Right-hand side for one axis: zero on every point row, the landmark's
  /// coordinate on its anchor row.
  pub fn rhs_for_axis(&self, anchors: &[f64]) -> Result<Vec<f64>> {
    if anchors.len() != self.n_landmarks {
      return Err(LayoutError::DimensionMismatch {
        context: "anchor coordinates vs landmarks",
        expected: self.n_landmarks,
        actual: anchors.len(),
      });
    }
    Ok(
      self
        .equations
        .iter()
        .map(|eq| match eq.kind {
          EquationKind::Anchor { landmark } => anchors[landmark],
          EquationKind::Neighborhood | EquationKind::Isolated => 0.0,
        })
        .collect(),
    )
  }
}

/// Builds the [`EquationSystem`] for an augmented dataset.
///
/// `similarity` must cover exactly `n_points + n_landmarks` vectors, with the
/// landmarks last.
#[derive(TypedBuilder)]
pub struct NeighborhoodEquations<'s> {
  similarity: &'s SimilarityMatrix,
  n_points: usize,
  n_landmarks: usize,
  #[builder(default = 10)]
  neighborhood_size: usize,
}

impl<'s> NeighborhoodEquations<'s> {
  pub fn exec(self) -> Result<EquationSystem> {
    let Self {
      similarity,
      n_points,
      n_landmarks,
      neighborhood_size,
    } = self;

    if neighborhood_size == 0 {
      return Err(LayoutError::InvalidNeighborhoodSize(neighborhood_size));
    }
    let n_unknowns = n_points + n_landmarks;
    if similarity.n_vectors() != n_unknowns {
      return Err(LayoutError::DimensionMismatch {
        context: "similarity matrix vs augmented dataset",
        expected: n_unknowns,
        actual: similarity.n_vectors(),
      });
    }

    let started = Instant::now();

    let mut equations: Vec<Equation> = (0..n_points)
      .into_par_iter()
      .map(|row| neighborhood_equation(similarity, row, neighborhood_size))
      .collect();
    equations.extend((0..n_landmarks).map(|landmark| Equation {
      row: n_points + landmark,
      kind: EquationKind::Anchor { landmark },
      self_column: n_points + landmark,
      neighbors: Vec::new(),
    }));

    let isolated: Vec<usize> = equations
      .iter()
      .filter(|eq| eq.kind == EquationKind::Isolated)
      .map(|eq| eq.row)
      .collect();

    let nnz: usize = equations.iter().map(|eq| eq.neighbors.len() + 1).sum();
    let mut tri = TriMat::with_capacity((equations.len(), n_unknowns), nnz);
    for eq in &equations {
      tri.add_triplet(eq.row, eq.self_column, 1.0);
      for &(col, coef) in &eq.neighbors {
        tri.add_triplet(eq.row, col, coef);
      }
    }
    let matrix = tri.to_csr::<usize>();

    debug!(
      rows = equations.len(),
      nnz,
      isolated = isolated.len(),
      "neighborhood equations assembled"
    );
    info!(
      duration_ms = started.elapsed().as_millis(),
      n_points, n_landmarks, "equation system complete"
    );

    Ok(EquationSystem {
      equations,
      matrix,
      n_points,
      n_landmarks,
      isolated,
    })
  }
}

fn neighborhood_equation(similarity: &SimilarityMatrix, row: usize, neighborhood_size: usize) -> Equation {
  let mut knn = similarity.neighbors(row);
  // Most similar first; equal similarities resolved by column for determinism.
  knn.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
  knn.truncate(neighborhood_size);

  if knn.is_empty() {
    return Equation {
      row,
      kind: EquationKind::Isolated,
      self_column: row,
      neighbors: Vec::new(),
    };
  }

  let weight = 1.0 / knn.len() as f64;
  let mut neighbors: Vec<(usize, f64)> = knn.into_iter().map(|(col, _)| (col, -weight)).collect();
  neighbors.sort_unstable_by_key(|&(col, _)| col);
  // Last coefficient takes the remainder so the left-to-right sum is exactly -1.
  // The partial sum lies in [-1, -0.5] for count >= 2, so the subtraction is exact.
  if let Some((last, prefix)) = neighbors.split_last_mut() {
    let partial: f64 = prefix.iter().map(|&(_, c)| c).sum();
    last.1 = -1.0 - partial;
  }

  Equation {
    row,
    kind: EquationKind::Neighborhood,
    self_column: row,
    neighbors,
  }
}
