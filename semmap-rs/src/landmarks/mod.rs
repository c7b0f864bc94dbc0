use crate::context::LayoutRng;
use crate::error::Result;
use crate::sparse::DatasetView;
use crate::sparse::SparseVector;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;

pub mod kmeans;

/// A representative of one cluster of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
  /// Cluster id, `0..k`.
  pub id: usize,
  /// Unit-length centroid, or the zero vector for an empty cluster.
  pub centroid: SparseVector,
  /// Dataset indices assigned to this cluster, ascending.
  pub members: Vec<usize>,
}

/// Partitions a dataset into landmark clusters.
///
/// Implementations draw every random number from `rng`, which is shared with the
/// rest of the pipeline, so that equal seeds give equal landmarks.
pub trait LandmarkSelector: Debug + Send + Sync {
  /// Cluster `dataset` into `k` landmarks.
  ///
  /// # Arguments
  ///
  /// * `dataset` - Vectors to cluster; must not be empty
  /// * `k` - Number of clusters, at least 2
  /// * `eps` - Convergence tolerance on the clustering quality
  /// * `rng` - The pipeline's shared generator
  /// * `trials` - Independent restarts; the best-quality result wins
  ///
  /// # Errors
  ///
  /// `LayoutError::EmptyDataset` when `dataset` is empty.
  fn select(
    &self,
    dataset: &dyn DatasetView,
    k: usize,
    eps: f64,
    rng: &mut LayoutRng,
    trials: usize,
  ) -> Result<Vec<Landmark>>;
}
