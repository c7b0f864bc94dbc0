use crate::context::LayoutRng;
use crate::embedding::DistanceFn;
use crate::embedding::LandmarkLayoutEngine;
use crate::error::LayoutError;
use crate::error::Result;
use ndarray::Array2;
use rand::Rng;
use std::time::Instant;
use tracing::debug;
use tracing::info;

/// Default [`LandmarkLayoutEngine`]: SMACOF stress majorization with unit weights.
///
/// Starts from a uniform random configuration in [0, 1)² and applies the
/// Guttman transform until no point moves more than `eps` or `max_iterations`
/// is reached. The result is centered on the origin.
#[derive(Debug, Clone)]
pub struct StressMajorization {
  eps: f64,
  max_iterations: usize,
}

impl StressMajorization {
  pub fn new(eps: f64, max_iterations: usize) -> Self {
    Self {
      eps,
      max_iterations,
    }
  }
}

impl Default for StressMajorization {
  fn default() -> Self {
    Self::new(1e-5, 1000)
  }
}

impl LandmarkLayoutEngine for StressMajorization {
  fn embed(&self, n: usize, distance: &DistanceFn<'_>, rng: &mut LayoutRng) -> Result<Array2<f64>> {
    if !(self.eps >= 0.0) {
      return Err(LayoutError::InvalidParameter {
        name: "eps",
        reason: format!("must be a non-negative number, got {}", self.eps),
      });
    }
    if n == 0 {
      return Ok(Array2::zeros((0, 2)));
    }

    let mut delta = Array2::<f64>::zeros((n, n));
    for i in 0..n {
      for j in (i + 1)..n {
        let d = distance(i, j);
        if !d.is_finite() || d < 0.0 {
          return Err(LayoutError::Embedding(format!(
            "dissimilarity between {i} and {j} is {d}"
          )));
        }
        delta[(i, j)] = d;
        delta[(j, i)] = d;
      }
    }

    let started = Instant::now();
    let mut x = Array2::from_shape_fn((n, 2), |_| rng.random::<f64>());
    // Guttman steps keep the centroid fixed, so centering the start centers the result.
    center(&mut x);
    let mut iterations = 0;
    let mut movement = f64::INFINITY;

    while iterations < self.max_iterations {
      let next = guttman_transform(&x, &delta);
      movement = (0..n)
        .map(|i| (next[(i, 0)] - x[(i, 0)]).hypot(next[(i, 1)] - x[(i, 1)]))
        .fold(0.0, f64::max);
      x = next;
      iterations += 1;
      if movement < self.eps {
        break;
      }
    }

    debug!(iterations, movement, stress = stress(&x, &delta), "stress majorization finished");
    info!(
      duration_ms = started.elapsed().as_millis(),
      n, "landmark embedding complete"
    );

    Ok(x)
  }
}

fn center(x: &mut Array2<f64>) {
  let n = x.nrows() as f64;
  for mut column in x.columns_mut() {
    let mean = column.sum() / n;
    column.mapv_inplace(|v| v - mean);
  }
}

/// One SMACOF step: X' = B(X) X / n.
///
/// Row i of the product expands to (1/n) Σ_j (δ_ij / d_ij) (x_i - x_j); pairs
/// that currently coincide contribute nothing.
fn guttman_transform(x: &Array2<f64>, delta: &Array2<f64>) -> Array2<f64> {
  let n = x.nrows();
  let mut next = Array2::<f64>::zeros((n, 2));
  for i in 0..n {
    let (mut sx, mut sy) = (0.0, 0.0);
    for j in 0..n {
      if i == j {
        continue;
      }
      let dx = x[(i, 0)] - x[(j, 0)];
      let dy = x[(i, 1)] - x[(j, 1)];
      let d = dx.hypot(dy);
      if d > 1e-12 {
        let ratio = delta[(i, j)] / d;
        sx += ratio * dx;
        sy += ratio * dy;
      }
    }
    next[(i, 0)] = sx / n as f64;
    next[(i, 1)] = sy / n as f64;
  }
  next
}

/// Raw stress Σ_{i<j} (d_ij - δ_ij)².
fn stress(x: &Array2<f64>, delta: &Array2<f64>) -> f64 {
  let n = x.nrows();
  let mut total = 0.0;
  for i in 0..n {
    for j in (i + 1)..n {
      let d = (x[(i, 0)] - x[(j, 0)]).hypot(x[(i, 1)] - x[(j, 1)]);
      total += (d - delta[(i, j)]).powi(2);
    }
  }
  total
}
