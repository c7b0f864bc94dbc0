//! LSQR (Paige & Saunders, 1982) for sparse least squares.
//!
//! Golub-Kahan bidiagonalization with a QR update, started from x = 0, so a
//! rank-deficient system converges to its minimum-norm least-squares solution.
//! Only products with A and Aᵀ are needed.

use crate::error::Result;
use crate::solver::LeastSquaresSolution;
use crate::solver::LeastSquaresSolver;
use crate::solver::SolveReport;
use crate::solver::StopReason;
use crate::solver::validate_system;
use ndarray::Array1;
use sprs::CsMat;
use std::time::Instant;
use tracing::debug;
use tracing::info;

/// Default [`LeastSquaresSolver`].
#[derive(Debug, Clone)]
pub struct Lsqr {
  /// Relative tolerance on the coefficient matrix.
  atol: f64,
  /// Relative tolerance on the right-hand side.
  btol: f64,
}

impl Lsqr {
  pub fn new(atol: f64, btol: f64) -> Self {
    Self { atol, btol }
  }
}

impl Default for Lsqr {
  fn default() -> Self {
    Self::new(1e-10, 1e-10)
  }
}

impl LeastSquaresSolver for Lsqr {
  fn solve(
    &self,
    num_unknowns: usize,
    equations: &CsMat<f64>,
    rhs: &[f64],
    max_iterations: usize,
  ) -> Result<LeastSquaresSolution> {
    validate_system(num_unknowns, equations, rhs)?;

    let converted;
    let a = if equations.is_csr() {
      equations
    } else {
      converted = equations.to_csr();
      &converted
    };

    let started = Instant::now();
    let (solution, report) = lsqr(a, rhs, num_unknowns, max_iterations, self.atol, self.btol);
    info!(
      duration_ms = started.elapsed().as_millis(),
      iterations = report.iterations,
      residual_norm = report.residual_norm,
      stop_reason = ?report.stop_reason,
      "lsqr complete"
    );

    Ok(LeastSquaresSolution {
      solution: Array1::from(solution),
      report,
    })
  }
}

fn lsqr(
  a: &CsMat<f64>,
  b: &[f64],
  n: usize,
  max_iterations: usize,
  atol: f64,
  btol: f64,
) -> (Vec<f64>, SolveReport) {
  let m = b.len();
  let mut x = vec![0.0; n];

  let mut u = b.to_vec();
  let bnorm = norm(&u);
  let mut beta = bnorm;
  if beta == 0.0 {
    return (
      x,
      SolveReport {
        iterations: 0,
        residual_norm: 0.0,
        stop_reason: StopReason::ZeroRhs,
      },
    );
  }
  scale(&mut u, 1.0 / beta);

  let mut v = vec![0.0; n];
  mul_transpose(a, &u, &mut v);
  let mut alpha = norm(&v);
  if alpha == 0.0 {
    // Aᵀ b = 0: x = 0 already minimizes the residual.
    return (
      x,
      SolveReport {
        iterations: 0,
        residual_norm: bnorm,
        stop_reason: StopReason::LeastSquaresConverged,
      },
    );
  }
  scale(&mut v, 1.0 / alpha);

  let mut w = v.clone();
  let mut rhobar = alpha;
  let mut phibar = beta;
  let mut anorm = 0.0f64;
  let mut iterations = 0;
  let mut stop_reason = StopReason::IterationLimit;

  let mut av = vec![0.0; m];
  let mut atu = vec![0.0; n];

  while iterations < max_iterations {
    iterations += 1;

    // Continue the bidiagonalization.
    mul(a, &v, &mut av);
    for (ui, avi) in u.iter_mut().zip(&av) {
      *ui = avi - alpha * *ui;
    }
    beta = norm(&u);
    if beta > 0.0 {
      scale(&mut u, 1.0 / beta);
      mul_transpose(a, &u, &mut atu);
      for (vi, atui) in v.iter_mut().zip(&atu) {
        *vi = atui - beta * *vi;
      }
      alpha = norm(&v);
      if alpha > 0.0 {
        scale(&mut v, 1.0 / alpha);
      }
    }
    anorm = (anorm * anorm + alpha * alpha + beta * beta).sqrt();

    // Plane rotation eliminating the subdiagonal beta.
    let rho = rhobar.hypot(beta);
    if rho == 0.0 || !rho.is_finite() {
      stop_reason = StopReason::Breakdown;
      break;
    }
    let c = rhobar / rho;
    let s = beta / rho;
    let theta = s * alpha;
    rhobar = -c * alpha;
    let phi = c * phibar;
    phibar *= s;
    let tau = s * phi;

    let t1 = phi / rho;
    let t2 = -theta / rho;
    if !t1.is_finite() || !t2.is_finite() {
      stop_reason = StopReason::Breakdown;
      break;
    }
    for ((xi, wi), vi) in x.iter_mut().zip(w.iter_mut()).zip(&v) {
      *xi += t1 * *wi;
      *wi = vi + t2 * *wi;
    }

    let xnorm = norm(&x);
    let rnorm = phibar;
    let arnorm = alpha * tau.abs();

    if rnorm <= btol * bnorm + atol * anorm * xnorm {
      stop_reason = StopReason::Converged;
      break;
    }
    if anorm * rnorm > 0.0 && arnorm / (anorm * rnorm) <= atol {
      stop_reason = StopReason::LeastSquaresConverged;
      break;
    }
    if alpha == 0.0 || beta == 0.0 {
      stop_reason = StopReason::Breakdown;
      break;
    }
  }

  debug!(iterations, residual_norm = phibar, anorm, "lsqr iterations finished");

  (
    x,
    SolveReport {
      iterations,
      residual_norm: phibar,
      stop_reason,
    },
  )
}

/// y = A x
fn mul(a: &CsMat<f64>, x: &[f64], y: &mut [f64]) {
  for (row, vec) in a.outer_iterator().enumerate() {
    y[row] = vec.iter().map(|(col, &val)| val * x[col]).sum();
  }
}

/// y = Aᵀ u
fn mul_transpose(a: &CsMat<f64>, u: &[f64], y: &mut [f64]) {
  y.fill(0.0);
  for (row, vec) in a.outer_iterator().enumerate() {
    let ur = u[row];
    if ur == 0.0 {
      continue;
    }
    for (col, &val) in vec.iter() {
      y[col] += val * ur;
    }
  }
}

fn norm(v: &[f64]) -> f64 {
  v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn scale(v: &mut [f64], factor: f64) {
  for x in v.iter_mut() {
    *x *= factor;
  }
}
