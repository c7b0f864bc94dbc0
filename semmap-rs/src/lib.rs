//! Landmark-based least-squares layout of sparse, high-dimensional vectors in 2D.
//!
//! Given a dataset of sparse feature vectors (e.g. document term vectors),
//! this crate computes a "semantic map": a 2D position per vector such that
//! similar vectors end up close together. A few landmarks are clustered and
//! placed first; every other point is then positioned as the average of its
//! nearest neighbors by solving one sparse least-squares system per axis.
//!
//! # Example
//!
//! ```
//! use semmap_rs::LayoutContext;
//! use semmap_rs::SemanticLayout;
//! use semmap_rs::SemanticLayoutConfig;
//! use semmap_rs::SparseVector;
//!
//! let data = vec![
//!   SparseVector::from_pairs([(0, 1.0), (1, 1.0)]).unwrap(),
//!   SparseVector::from_pairs([(0, 1.0), (1, 0.9)]).unwrap(),
//!   SparseVector::from_pairs([(0, 0.8), (1, 1.0)]).unwrap(),
//!   SparseVector::from_pairs([(5, 1.0), (6, 1.0)]).unwrap(),
//!   SparseVector::from_pairs([(5, 1.0), (6, 0.7)]).unwrap(),
//! ];
//!
//! let mut config = SemanticLayoutConfig::default();
//! config.landmarks.n_landmarks = 2;
//! let layout = SemanticLayout::new(config);
//!
//! let mut ctx = LayoutContext::new(42);
//! let result = layout.compute_layout(&data, &mut ctx).unwrap();
//! assert_eq!(result.positions().nrows(), 5);
//! ```
//!
//! # Engines
//!
//! Clustering, landmark embedding and the least-squares solve are behind
//! traits, with these defaults:
//!
//! * [`LandmarkSelector`] - [`SphericalKMeans`]
//! * [`LandmarkLayoutEngine`] - [`StressMajorization`]
//! * [`LeastSquaresSolver`] - [`Lsqr`]
//!
//! # Determinism
//!
//! All randomness comes from the generator in [`LayoutContext`]. Equal seeds
//! give equal layouts, and a failed or cancelled run leaves the generator as
//! it found it.

pub mod bounds;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod embedding;
pub mod equations;
pub mod error;
pub mod landmarks;
pub mod layout;
pub mod similarity;
pub mod solver;
pub mod sparse;

pub use bounds::LayoutBounds;
pub use config::EmbeddingParams;
pub use config::LandmarkParams;
pub use config::NeighborhoodParams;
pub use config::SemanticLayoutConfig;
pub use config::SimilarityParams;
pub use config::SolverParams;
pub use context::CancellationToken;
pub use context::LayoutContext;
pub use context::LayoutRng;
pub use diagnostics::DiagnosticLevel;
pub use diagnostics::DiagnosticsSink;
pub use diagnostics::NoopDiagnostics;
pub use diagnostics::TracingDiagnostics;
pub use embedding::LandmarkLayoutEngine;
pub use embedding::stress_majorization::StressMajorization;
pub use equations::EquationSystem;
pub use equations::NeighborhoodEquations;
pub use error::LayoutError;
pub use landmarks::Landmark;
pub use landmarks::LandmarkSelector;
pub use landmarks::kmeans::SphericalKMeans;
pub use layout::LayoutResult;
pub use layout::LayoutStage;
pub use layout::SemanticLayout;
pub use similarity::MatrixShape;
pub use similarity::SimilarityMatrix;
pub use similarity::SimilarityMatrixBuilder;
pub use similarity::SimilarityMeasure;
pub use solver::LeastSquaresSolution;
pub use solver::LeastSquaresSolver;
pub use solver::SolveReport;
pub use solver::StopReason;
pub use solver::lsqr::Lsqr;
pub use sparse::DatasetView;
pub use sparse::SparseVector;

#[cfg(test)]
mod tests;
