use crate::layout::LayoutStage;
use thiserror::Error;

/// Errors produced while computing a semantic layout.
///
/// Precondition violations are raised before any collaborator runs.
/// Collaborator failures (`Clustering`, `Embedding`, `Solver`) are created by
/// the collaborator itself and reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
  #[error("dataset must contain at least one vector")]
  EmptyDataset,

  #[error("landmark count must be >= 2, got {0}")]
  TooFewLandmarks(usize),

  #[error("similarity threshold must be a non-negative number, got {0}")]
  NegativeThreshold(f64),

  #[error("neighborhood size must be >= 1, got {0}")]
  InvalidNeighborhoodSize(usize),

  #[error("invalid parameter `{name}`: {reason}")]
  InvalidParameter { name: &'static str, reason: String },

  #[error("invalid sparse vector: {0}")]
  InvalidVector(String),

  #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
  DimensionMismatch {
    context: &'static str,
    expected: usize,
    actual: usize,
  },

  #[error("layout computation cancelled before {0}")]
  Cancelled(LayoutStage),

  #[error("clustering failed: {0}")]
  Clustering(String),

  #[error("landmark embedding failed: {0}")]
  Embedding(String),

  #[error("least-squares solve failed: {0}")]
  Solver(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
