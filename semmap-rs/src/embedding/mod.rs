use crate::context::LayoutRng;
use crate::error::Result;
use ndarray::Array2;
use std::fmt::Debug;

pub mod stress_majorization;

/// Pairwise dissimilarity between landmarks, symmetric, in [0, 1].
pub type DistanceFn<'a> = dyn Fn(usize, usize) -> f64 + Sync + 'a;

/// Places a small set of landmarks in 2D so that their pairwise Euclidean
/// distances follow the given dissimilarities.
pub trait LandmarkLayoutEngine: Debug + Send + Sync {
  /// Compute an `n × 2` array of positions.
  ///
  /// # Arguments
  ///
  /// * `n` - Number of landmarks
  /// * `distance` - Target dissimilarity for every pair `(i, j)`, `i != j`
  /// * `rng` - The pipeline's shared generator, used for the starting configuration
  fn embed(&self, n: usize, distance: &DistanceFn<'_>, rng: &mut LayoutRng) -> Result<Array2<f64>>;
}
