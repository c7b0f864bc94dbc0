use crate::error::LayoutError;
use crate::error::Result;
use crate::sparse::SparseVector;
use ndarray::Array1;
use serde::Deserialize;
use serde::Serialize;
use sprs::CsMat;
use std::fmt::Debug;

pub mod lsqr;

/// Why an iterative solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
  /// The right-hand side is zero, so the solution is zero.
  ZeroRhs,
  /// The residual is small relative to the right-hand side: the system is
  /// (numerically) consistent.
  Converged,
  /// The normal-equation residual is small: a least-squares minimizer was found.
  LeastSquaresConverged,
  /// The bidiagonalization terminated early; the current iterate is exact
  /// for the reachable subspace.
  Breakdown,
  /// The iteration cap was reached; the last iterate is returned.
  IterationLimit,
}

/// Convergence information for one solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
  pub iterations: usize,
  /// Estimate of ‖b − A x‖.
  pub residual_norm: f64,
  pub stop_reason: StopReason,
}

/// Result of a least-squares solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresSolution {
  pub solution: Array1<f64>,
  pub report: SolveReport,
}

impl LeastSquaresSolution {
  /// Evaluate a sparse row against the solution: Σ row[j] · x[j].
  pub fn predict(&self, row: &SparseVector) -> Result<f64> {
    let n = self.solution.len();
    let mut total = 0.0;
    for (idx, value) in row.iter() {
      let idx = idx as usize;
      if idx >= n {
        return Err(LayoutError::DimensionMismatch {
          context: "predict row index",
          expected: n,
          actual: idx + 1,
        });
      }
      total += self.solution[idx] * value;
    }
    Ok(total)
  }
}

/// Solves sparse, possibly overdetermined or rank-deficient systems `A x ≈ b`
/// in the least-squares sense.
///
/// A solver keeps no state between calls.
pub trait LeastSquaresSolver: Debug + Send + Sync {
  /// # Arguments
  ///
  /// * `num_unknowns` - Length of the solution; must equal the column count of `equations`
  /// * `equations` - Coefficient matrix, one row per equation
  /// * `rhs` - Right-hand side, one value per equation
  /// * `max_iterations` - Iteration cap; see [`default_max_iterations`]
  fn solve(
    &self,
    num_unknowns: usize,
    equations: &CsMat<f64>,
    rhs: &[f64],
    max_iterations: usize,
  ) -> Result<LeastSquaresSolution>;
}

/// Iteration cap used when none is configured: headroom grows with the size
/// of the problem.
pub fn default_max_iterations(num_unknowns: usize, num_equations: usize) -> usize {
  num_unknowns + num_equations + 50
}

/// Check that `equations` is `rhs.len() × num_unknowns`.
pub fn validate_system(num_unknowns: usize, equations: &CsMat<f64>, rhs: &[f64]) -> Result<()> {
  let (rows, cols) = equations.shape();
  if cols != num_unknowns {
    return Err(LayoutError::DimensionMismatch {
      context: "equation columns vs unknowns",
      expected: num_unknowns,
      actual: cols,
    });
  }
  if rows != rhs.len() {
    return Err(LayoutError::DimensionMismatch {
      context: "right-hand side length vs equations",
      expected: rows,
      actual: rhs.len(),
    });
  }
  Ok(())
}
