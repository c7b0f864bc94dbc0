use crate::bounds::LayoutBounds;
use crate::similarity::SimilarityMeasure;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for landmark selection.
///
/// Landmarks are cluster centroids; they are placed first and anchor the rest
/// of the layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkParams {
  /// Number of landmarks (clusters).
  ///
  /// More landmarks pin the layout at more places, at quadratic cost in the
  /// landmark embedding. Should be smaller than the dataset.
  ///
  /// Must be >= 2.
  ///
  /// Default: 100
  pub n_landmarks: usize,

  /// Clustering stops once the mean point-to-centroid similarity changes by no
  /// more than this between iterations.
  ///
  /// Default: 0.01
  pub kmeans_eps: f64,

  /// Independent clustering restarts; the best-quality clustering is kept.
  ///
  /// Default: 1
  pub trials: usize,

  /// Cap on clustering iterations per trial.
  ///
  /// Default: 100
  pub max_iterations: usize,
}

impl Default for LandmarkParams {
  fn default() -> Self {
    Self {
      n_landmarks: 100,
      kmeans_eps: 0.01,
      trials: 1,
      max_iterations: 100,
    }
  }
}

/// Configuration for the pairwise similarity matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityParams {
  /// Pairs less similar than this are not stored and count as unrelated.
  ///
  /// This is the only bound on similarity memory, which is quadratic in the
  /// dataset size at threshold 0.
  ///
  /// Must be >= 0.
  ///
  /// Default: 0.005
  pub threshold: f64,

  /// Default: Cosine
  pub measure: SimilarityMeasure,
}

impl Default for SimilarityParams {
  fn default() -> Self {
    Self {
      threshold: 0.005,
      measure: SimilarityMeasure::Cosine,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodParams {
  /// Maximum number of nearest neighbors each point is averaged over.
  ///
  /// Must be >= 1.
  ///
  /// Default: 10
  pub size: usize,
}

impl Default for NeighborhoodParams {
  fn default() -> Self {
    Self { size: 10 }
  }
}

/// Configuration for placing the landmarks in 2D.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingParams {
  /// Stop once no landmark moves further than this in one iteration.
  ///
  /// Default: 1e-5
  pub eps: f64,

  /// Default: 1000
  pub max_iterations: usize,
}

impl Default for EmbeddingParams {
  fn default() -> Self {
    Self {
      eps: 1e-5,
      max_iterations: 1000,
    }
  }
}

/// Configuration for the two least-squares solves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
  /// Iteration cap per axis.
  ///
  /// If `None`, uses `unknowns + equations + 50`.
  ///
  /// Default: None
  pub max_iterations: Option<usize>,

  /// Default: 1e-10
  pub atol: f64,

  /// Default: 1e-10
  pub btol: f64,
}

impl Default for SolverParams {
  fn default() -> Self {
    Self {
      max_iterations: None,
      atol: 1e-10,
      btol: 1e-10,
    }
  }
}

/// Complete configuration for [`SemanticLayout`](crate::SemanticLayout).
///
/// # Example
///
/// ```
/// use semmap_rs::SemanticLayoutConfig;
///
/// let mut config = SemanticLayoutConfig::default();
/// config.landmarks.n_landmarks = 20;
/// config.similarity.threshold = 0.01;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticLayoutConfig {
  /// Seed for [`SemanticLayout::compute_layout_seeded`](crate::SemanticLayout::compute_layout_seeded).
  ///
  /// Default: 1
  #[serde(default = "default_seed")]
  pub seed: u64,
  #[serde(default)]
  pub landmarks: LandmarkParams,
  #[serde(default)]
  pub similarity: SimilarityParams,
  #[serde(default)]
  pub neighborhood: NeighborhoodParams,
  #[serde(default)]
  pub embedding: EmbeddingParams,
  #[serde(default)]
  pub solver: SolverParams,
  /// Optional rectangle the final layout is fitted into.
  ///
  /// Default: None
  #[serde(default)]
  pub bounds: Option<LayoutBounds>,
}

impl Default for SemanticLayoutConfig {
  fn default() -> Self {
    Self {
      seed: default_seed(),
      landmarks: LandmarkParams::default(),
      similarity: SimilarityParams::default(),
      neighborhood: NeighborhoodParams::default(),
      embedding: EmbeddingParams::default(),
      solver: SolverParams::default(),
      bounds: None,
    }
  }
}

fn default_seed() -> u64 {
  1
}
